use std::{fmt::Debug, future::Future, sync::Arc};

use chrono::Utc;
use log::*;
use pos_common::{Money, Quantity};
use serde_json::json;

use crate::{
    api::{
        errors::{OrderFlowError, OrderRuleError},
        order_objects::{ItemRemoval, NewOrder, NewOrderItem, OnlinePayRequest, OrderQueryFilter, PaidParams},
        order_rules::{check_quantity, check_unit_price},
        payment_objects::PaymentRequest,
        OrderDomainService,
        PaymentDomainService,
    },
    db::{
        sqlite::{carts, logs, orders, payments, tables, Session, SqliteDatabase},
        traits::{OrderManagement, ProductCatalog},
    },
    db_types::{
        BusinessType,
        CartItem,
        DiningTable,
        FinanceLog,
        Order,
        OrderItem,
        OrderLog,
        OrderNo,
        OrderStatus,
        Payment,
    },
    events::{
        OrderEvent,
        OrderNotifier,
        ORDER_APPEND_ITEM,
        ORDER_CANCEL,
        ORDER_CHANGE_PRICE,
        ORDER_CREATE,
        ORDER_DISCOUNT,
        ORDER_REMOVE_ITEM,
        ORDER_TURN_TABLE,
    },
    lock::{keys, LockManager},
    operator::Operator,
    providers::PaymentParams,
    sequence::SequenceGenerator,
};

pub const ORDER_COMPLETE_LOG: &str = "order.complete";

/// `OrderApi` is the entry point for everything a cashier, waiter or customer does to an order or a table's cart.
///
/// Every mutating call follows the same shape: take the key's lock, open a unit of work, load the aggregate, check the
/// guards, mutate, persist, fire the event and commit, then release the lock. Catalog snapshots and sequence numbers
/// are taken before the unit of work opens, since they read through the pool.
pub struct OrderApi {
    db: SqliteDatabase,
    locks: LockManager,
    sequences: SequenceGenerator,
    orders: Arc<OrderDomainService>,
    payments: Arc<PaymentDomainService>,
    notifier: Arc<OrderNotifier>,
}

impl Debug for OrderApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderApi")
    }
}

impl OrderApi {
    pub fn new(
        db: SqliteDatabase,
        locks: LockManager,
        sequences: SequenceGenerator,
        orders: Arc<OrderDomainService>,
        payments: Arc<PaymentDomainService>,
        notifier: Arc<OrderNotifier>,
    ) -> Self {
        Self { db, locks, sequences, orders, payments, notifier }
    }

    pub fn db(&self) -> &SqliteDatabase {
        &self.db
    }

    /// Runs `operation` while holding the lock on `key`. The lock is released however the operation ends.
    async fn locked<T, F>(&self, key: String, operation: F) -> Result<T, OrderFlowError>
    where F: Future<Output = Result<T, OrderFlowError>> {
        let guard = self.locks.acquire(key).await?;
        let result = operation.await;
        guard.release().await;
        result
    }

    //------------------------------------------   Creating orders   -------------------------------------------------

    /// Opens a new order from explicitly listed items and seats it at its table, if it has one.
    pub async fn create_order(&self, operator: &Operator, request: NewOrder) -> Result<Order, OrderFlowError> {
        if request.items.is_empty() {
            return Err(OrderRuleError::NoItems.into());
        }
        let items = self.snapshot(request.store_id, &request.items).await?;
        let order_no = self.next_order_no().await?;
        self.locked(keys::order(&order_no), self.insert_new_order(operator, order_no.clone(), &request, items, None))
            .await
    }

    /// Converts the cart of `table_id` into an order and empties the cart, in one unit of work.
    pub async fn create_order_from_cart(
        &self,
        operator: &Operator,
        store_id: i64,
        table_id: i64,
        remark: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        self.locked(keys::cart(table_id), self.create_from_cart_locked(operator, store_id, table_id, remark)).await
    }

    async fn create_from_cart_locked(
        &self,
        operator: &Operator,
        store_id: i64,
        table_id: i64,
        remark: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let cart = self.read_cart(table_id).await?;
        if cart.is_empty() {
            return Err(OrderFlowError::CartEmpty(table_id));
        }
        let request = NewOrder {
            store_id,
            table_id: Some(table_id),
            items: cart.iter().map(NewOrderItem::from).collect(),
            remark,
        };
        let items = self.snapshot(store_id, &request.items).await?;
        let order_no = self.next_order_no().await?;
        let insert = self.insert_new_order(operator, order_no.clone(), &request, items, Some(table_id));
        self.locked(keys::order(&order_no), insert).await
    }

    async fn insert_new_order(
        &self,
        operator: &Operator,
        order_no: OrderNo,
        request: &NewOrder,
        items: Vec<OrderItem>,
        from_cart: Option<i64>,
    ) -> Result<Order, OrderFlowError> {
        let mut session = self.db.begin().await?;
        if let Some(table_id) = request.table_id {
            check_table(request.store_id, table_id, &mut session).await?;
        }
        let order = Order::open(order_no, request, items, operator)?;
        let order = orders::insert_order(order, session.conn()).await?;
        if let Some(table_id) = from_cart {
            let cleared = carts::clear_cart(table_id, session.conn()).await?;
            debug!("🧾️ Cleared {cleared} cart items from table {table_id} into order {}", order.order_no);
        }
        let event = OrderEvent::new(order.clone(), operator.clone()).with_items(order.items.clone());
        self.notifier.fire(ORDER_CREATE, &mut session, &event).await?;
        session.commit().await?;
        info!("🧾️ {operator} opened order {} for {}", order.order_no, order.real_price);
        Ok(order)
    }

    //------------------------------------------   Changing orders   -------------------------------------------------

    pub async fn append_items(
        &self,
        operator: &Operator,
        order_no: &OrderNo,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, OrderFlowError> {
        self.locked(keys::order(order_no), self.append_locked(operator, order_no, items)).await
    }

    async fn append_locked(
        &self,
        operator: &Operator,
        order_no: &OrderNo,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, OrderFlowError> {
        if items.is_empty() {
            return Err(OrderRuleError::NoItems.into());
        }
        let current = self.orders.order(order_no).await?;
        // Fail before pricing anything if the order is already closed.
        current.ensure_mutable(false)?;
        let new_items = self.snapshot(current.store_id, &items).await?;
        let mut session = self.db.begin().await?;
        let mut order = load_order(order_no, &mut session).await?;
        guard_mutable(&order, &mut session).await?;
        let mut added = Vec::with_capacity(new_items.len());
        for item in new_items {
            let item = orders::insert_item(order.id, item, session.conn()).await?;
            added.push(item.clone());
            order.items.push(item);
        }
        order.recalculate()?;
        orders::update_order(&mut order, session.conn()).await?;
        let event = OrderEvent::new(order.clone(), operator.clone()).with_items(added);
        self.notifier.fire(ORDER_APPEND_ITEM, &mut session, &event).await?;
        session.commit().await?;
        debug!("🧾️ {operator} appended {} items to order {order_no}", items.len());
        Ok(order)
    }

    /// Removes whole lines or part of their quantity. A discount that exceeds the new total is reduced to it.
    pub async fn remove_items(
        &self,
        operator: &Operator,
        order_no: &OrderNo,
        removals: Vec<ItemRemoval>,
    ) -> Result<Order, OrderFlowError> {
        self.locked(keys::order(order_no), self.remove_locked(operator, order_no, removals)).await
    }

    async fn remove_locked(
        &self,
        operator: &Operator,
        order_no: &OrderNo,
        removals: Vec<ItemRemoval>,
    ) -> Result<Order, OrderFlowError> {
        if removals.is_empty() {
            return Err(OrderRuleError::NoItems.into());
        }
        let mut session = self.db.begin().await?;
        let mut order = load_order(order_no, &mut session).await?;
        guard_mutable(&order, &mut session).await?;
        let mut removed = Vec::with_capacity(removals.len());
        for removal in removals {
            let item = order.item_mut(removal.item_id)?;
            match removal.quantity {
                Some(quantity) if !quantity.is_positive() => return Err(OrderRuleError::InvalidQuantity.into()),
                Some(quantity) if quantity < item.quantity => {
                    item.quantity = item.quantity - quantity;
                    item.recalculate()?;
                    orders::update_item(item, session.conn()).await?;
                    let mut part = item.clone();
                    part.quantity = quantity;
                    part.recalculate()?;
                    removed.push(part);
                },
                _ => {
                    let item = item.clone();
                    orders::delete_item(item.id, session.conn()).await?;
                    order.items.retain(|i| i.id != item.id);
                    removed.push(item);
                },
            }
        }
        order.recalculate()?;
        orders::update_order(&mut order, session.conn()).await?;
        let event = OrderEvent::new(order.clone(), operator.clone()).with_items(removed);
        self.notifier.fire(ORDER_REMOVE_ITEM, &mut session, &event).await?;
        session.commit().await?;
        debug!("🧾️ {operator} removed items from order {order_no}. Total is now {}", order.total_price);
        Ok(order)
    }

    /// Overrides the unit price of one line.
    pub async fn change_item_price(
        &self,
        operator: &Operator,
        order_no: &OrderNo,
        item_id: i64,
        price: Money,
    ) -> Result<Order, OrderFlowError> {
        self.locked(keys::order(order_no), self.change_price_locked(operator, order_no, item_id, price)).await
    }

    async fn change_price_locked(
        &self,
        operator: &Operator,
        order_no: &OrderNo,
        item_id: i64,
        price: Money,
    ) -> Result<Order, OrderFlowError> {
        check_unit_price(price)?;
        let mut session = self.db.begin().await?;
        let mut order = load_order(order_no, &mut session).await?;
        guard_mutable(&order, &mut session).await?;
        let item = order.item_mut(item_id)?;
        let old_price = item.unit_price;
        item.unit_price = price;
        item.recalculate()?;
        orders::update_item(item, session.conn()).await?;
        let changed = item.clone();
        order.recalculate()?;
        orders::update_order(&mut order, session.conn()).await?;
        let event = OrderEvent::new(order.clone(), operator.clone()).with_items(vec![changed]);
        self.notifier.fire(ORDER_CHANGE_PRICE, &mut session, &event).await?;
        session.commit().await?;
        debug!("🧾️ {operator} repriced item {item_id} of order {order_no} from {old_price} to {price}");
        Ok(order)
    }

    /// Sets the order's discount. It must lie between zero and the total price.
    pub async fn discount(&self, operator: &Operator, order_no: &OrderNo, amount: Money) -> Result<Order, OrderFlowError> {
        self.locked(keys::order(order_no), self.discount_locked(operator, order_no, amount)).await
    }

    async fn discount_locked(
        &self,
        operator: &Operator,
        order_no: &OrderNo,
        amount: Money,
    ) -> Result<Order, OrderFlowError> {
        let mut session = self.db.begin().await?;
        let mut order = load_order(order_no, &mut session).await?;
        guard_mutable(&order, &mut session).await?;
        order.set_discount(amount)?;
        orders::update_order(&mut order, session.conn()).await?;
        let event = OrderEvent::new(order.clone(), operator.clone());
        self.notifier.fire(ORDER_DISCOUNT, &mut session, &event).await?;
        session.commit().await?;
        debug!("🧾️ {operator} discounted order {order_no} by {amount}");
        Ok(order)
    }

    /// Moves an order to another table. The new table must be free; the old one is released.
    pub async fn turn_table(&self, operator: &Operator, order_no: &OrderNo, table_id: i64) -> Result<Order, OrderFlowError> {
        self.locked(keys::order(order_no), self.turn_table_locked(operator, order_no, table_id)).await
    }

    async fn turn_table_locked(
        &self,
        operator: &Operator,
        order_no: &OrderNo,
        table_id: i64,
    ) -> Result<Order, OrderFlowError> {
        let mut session = self.db.begin().await?;
        let mut order = load_order(order_no, &mut session).await?;
        guard_mutable(&order, &mut session).await?;
        if order.table_id == Some(table_id) {
            return Err(OrderRuleError::SameTable(order_no.clone(), table_id).into());
        }
        check_table(order.store_id, table_id, &mut session).await?;
        let previous = order.table_id.replace(table_id);
        orders::update_order(&mut order, session.conn()).await?;
        let event = OrderEvent::new(order.clone(), operator.clone()).with_previous_table(previous);
        self.notifier.fire(ORDER_TURN_TABLE, &mut session, &event).await?;
        session.commit().await?;
        debug!("🧾️ {operator} moved order {order_no} from table {previous:?} to {table_id}");
        Ok(order)
    }

    pub async fn cancel(&self, operator: &Operator, order_no: &OrderNo, reason: &str) -> Result<Order, OrderFlowError> {
        self.locked(keys::order(order_no), self.cancel_locked(operator, order_no, reason)).await
    }

    async fn cancel_locked(&self, operator: &Operator, order_no: &OrderNo, reason: &str) -> Result<Order, OrderFlowError> {
        let mut session = self.db.begin().await?;
        let mut order = load_order(order_no, &mut session).await?;
        guard_mutable(&order, &mut session).await?;
        order.status = OrderStatus::Cancelled;
        order.cancelled_at = Some(Utc::now());
        order.cancel_reason = Some(reason.to_string());
        orders::update_order(&mut order, session.conn()).await?;
        let event = OrderEvent::new(order.clone(), operator.clone());
        self.notifier.fire(ORDER_CANCEL, &mut session, &event).await?;
        session.commit().await?;
        info!("🧾️ {operator} cancelled order {order_no}: {reason}");
        Ok(order)
    }

    //------------------------------------------      Payments       -------------------------------------------------

    /// Applies a cash payment at the till.
    pub async fn cash_paid(&self, operator: &Operator, order_no: &OrderNo, amount: Money) -> Result<Order, OrderFlowError> {
        self.locked(keys::order(order_no), self.cash_paid_locked(operator, order_no, amount)).await
    }

    async fn cash_paid_locked(
        &self,
        operator: &Operator,
        order_no: &OrderNo,
        amount: Money,
    ) -> Result<Order, OrderFlowError> {
        let mut session = self.db.begin().await?;
        let order = load_order(order_no, &mut session).await?;
        if has_payment_in_flight(order_no, &mut session).await? {
            return Err(OrderRuleError::PaymentInFlight(order.order_no).into());
        }
        let order = self.orders.paid(&mut session, PaidParams::cash(order_no.clone(), amount, operator.clone())).await?;
        session.commit().await?;
        Ok(order)
    }

    /// Starts a provider payment for (part of) the order. The order itself is only updated when the provider's success
    /// callback is processed.
    pub async fn pay_online(
        &self,
        operator: &Operator,
        order_no: &OrderNo,
        request: OnlinePayRequest,
    ) -> Result<Payment, OrderFlowError> {
        self.locked(keys::order(order_no), self.pay_online_locked(operator, order_no, request)).await
    }

    async fn pay_online_locked(
        &self,
        operator: &Operator,
        order_no: &OrderNo,
        request: OnlinePayRequest,
    ) -> Result<Payment, OrderFlowError> {
        let order = self.orders.order(order_no).await?;
        let in_flight = {
            let mut session = self.db.session().await?;
            let in_flight = has_payment_in_flight(order_no, &mut session).await?;
            session.commit().await?;
            in_flight
        };
        if in_flight {
            return Err(OrderRuleError::PaymentInFlight(order.order_no).into());
        }
        order.can_paid(request.amount, request.provider.nominal_channel())?;
        let params = PaymentParams {
            amount: request.amount,
            description: request.description.unwrap_or_else(|| format!("Order {order_no}")),
            auth_code: request.auth_code,
            member_token: request.member_token,
        };
        let payment_request = PaymentRequest {
            provider: request.provider,
            business_type: BusinessType::Order,
            business_id: order_no.to_string(),
            params,
        };
        let payment = self.payments.process_payment(payment_request).await?;
        info!("🧾️ {operator} started payment {} of {} for order {order_no}", payment.seq_no, payment.amount);
        Ok(payment)
    }

    /// Abandons a stuck provider payment so that the order can be paid another way or changed again.
    pub async fn close_payment(&self, operator: &Operator, seq_no: &str, reason: &str) -> Result<Payment, OrderFlowError> {
        let payment = self.payments.close_payment(seq_no, reason).await?;
        info!("🧾️ {operator} closed payment {seq_no} of order {}", payment.business_id);
        Ok(payment)
    }

    /// Closes out a paid order. No event is fired; the change is recorded in the order log.
    pub async fn complete(&self, operator: &Operator, order_no: &OrderNo) -> Result<Order, OrderFlowError> {
        self.locked(keys::order(order_no), self.complete_locked(operator, order_no)).await
    }

    async fn complete_locked(&self, operator: &Operator, order_no: &OrderNo) -> Result<Order, OrderFlowError> {
        let mut session = self.db.begin().await?;
        let mut order = load_order(order_no, &mut session).await?;
        if order.status != OrderStatus::Paid {
            return Err(OrderRuleError::NotPaid { order_no: order.order_no, status: order.status }.into());
        }
        order.status = OrderStatus::Finished;
        order.finished_at.get_or_insert_with(Utc::now);
        orders::update_order(&mut order, session.conn()).await?;
        let content = json!({ "status": order.status, "paid": order.paid }).to_string();
        logs::insert_order_log(order_no, ORDER_COMPLETE_LOG, operator, &content, session.conn()).await?;
        session.commit().await?;
        info!("🧾️ {operator} completed order {order_no}");
        Ok(order)
    }

    //------------------------------------------        Carts        -------------------------------------------------

    /// Adds a line to a table's cart. The product is priced against the catalog to validate it, but prices are only
    /// fixed when the cart becomes an order.
    pub async fn add_cart_item(&self, table_id: i64, item: NewOrderItem) -> Result<CartItem, OrderFlowError> {
        let table = self.db.fetch_table(table_id).await?.ok_or(OrderFlowError::TableNotFound(table_id))?;
        self.snapshot(table.store_id, std::slice::from_ref(&item)).await?;
        self.locked(keys::cart(table_id), async {
            let mut session = self.db.session().await?;
            let NewOrderItem { product_id, spec_id, option_ids, quantity } = item;
            let cart_item =
                carts::insert_cart_item(table_id, product_id, spec_id, option_ids, quantity, session.conn()).await?;
            session.commit().await?;
            trace!("🧾️ Cart of table {table_id} gained item {}", cart_item.id);
            Ok::<_, OrderFlowError>(cart_item)
        })
        .await
    }

    pub async fn update_cart_item(
        &self,
        table_id: i64,
        item_id: i64,
        quantity: Quantity,
    ) -> Result<CartItem, OrderFlowError> {
        check_quantity(quantity)?;
        self.locked(keys::cart(table_id), async {
            let mut session = self.db.session().await?;
            let item = carts::update_cart_item_quantity(table_id, item_id, quantity, session.conn()).await?;
            session.commit().await?;
            Ok::<_, OrderFlowError>(item)
        })
        .await
    }

    pub async fn remove_cart_item(&self, table_id: i64, item_id: i64) -> Result<(), OrderFlowError> {
        self.locked(keys::cart(table_id), async {
            let mut session = self.db.session().await?;
            carts::delete_cart_item(table_id, item_id, session.conn()).await?;
            session.commit().await?;
            Ok::<_, OrderFlowError>(())
        })
        .await
    }

    /// Empties the cart and returns how many items were removed.
    pub async fn clear_cart(&self, table_id: i64) -> Result<u64, OrderFlowError> {
        self.locked(keys::cart(table_id), async {
            let mut session = self.db.session().await?;
            let count = carts::clear_cart(table_id, session.conn()).await?;
            session.commit().await?;
            Ok::<_, OrderFlowError>(count)
        })
        .await
    }

    pub async fn cart(&self, table_id: i64) -> Result<Vec<CartItem>, OrderFlowError> {
        self.locked(keys::cart(table_id), self.read_cart(table_id)).await
    }

    async fn read_cart(&self, table_id: i64) -> Result<Vec<CartItem>, OrderFlowError> {
        let mut session = self.db.session().await?;
        let cart = carts::fetch_cart(table_id, session.conn()).await?;
        session.commit().await?;
        Ok(cart)
    }

    //------------------------------------------        Reads        -------------------------------------------------

    pub async fn order(&self, order_no: &OrderNo) -> Result<Order, OrderFlowError> {
        self.orders.order(order_no).await
    }

    pub async fn orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        self.orders.orders(filter).await
    }

    pub async fn payments_for_order(&self, order_no: &OrderNo) -> Result<Vec<Payment>, OrderFlowError> {
        Ok(self.db.fetch_payments_for_order(order_no).await?)
    }

    pub async fn order_logs(&self, order_no: &OrderNo) -> Result<Vec<OrderLog>, OrderFlowError> {
        Ok(self.db.fetch_order_logs(order_no).await?)
    }

    pub async fn finance_logs(&self, order_no: &OrderNo) -> Result<Vec<FinanceLog>, OrderFlowError> {
        Ok(self.db.fetch_finance_logs(order_no).await?)
    }

    pub async fn table(&self, table_id: i64) -> Result<DiningTable, OrderFlowError> {
        self.db.fetch_table(table_id).await?.ok_or(OrderFlowError::TableNotFound(table_id))
    }

    //------------------------------------------       Helpers       -------------------------------------------------

    async fn snapshot(&self, store_id: i64, items: &[NewOrderItem]) -> Result<Vec<OrderItem>, OrderFlowError> {
        let mut result = Vec::with_capacity(items.len());
        for item in items {
            check_quantity(item.quantity)?;
            let mut snapshot = self.db.snapshot_item(store_id, item).await?;
            snapshot.recalculate()?;
            result.push(snapshot);
        }
        Ok(result)
    }

    async fn next_order_no(&self) -> Result<OrderNo, OrderFlowError> {
        let mut session = self.db.session().await?;
        let order_no = self.sequences.next_order_no(session.conn()).await?;
        session.commit().await?;
        Ok(order_no)
    }
}

async fn load_order(order_no: &OrderNo, session: &mut Session) -> Result<Order, OrderFlowError> {
    orders::fetch_order(order_no, session.conn()).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_no.clone()))
}

async fn has_payment_in_flight(order_no: &OrderNo, session: &mut Session) -> Result<bool, OrderFlowError> {
    let in_flight = payments::has_incomplete_payment(BusinessType::Order, order_no.as_str(), session.conn()).await?;
    Ok(in_flight)
}

async fn guard_mutable(order: &Order, session: &mut Session) -> Result<(), OrderFlowError> {
    let in_flight = has_payment_in_flight(&order.order_no, session).await?;
    order.ensure_mutable(in_flight)?;
    Ok(())
}

async fn check_table(store_id: i64, table_id: i64, session: &mut Session) -> Result<DiningTable, OrderFlowError> {
    let table = tables::fetch_table(table_id, session.conn()).await?.ok_or(OrderFlowError::TableNotFound(table_id))?;
    if table.store_id != store_id {
        return Err(OrderRuleError::ForeignTable { table_id, store_id }.into());
    }
    Ok(table)
}
