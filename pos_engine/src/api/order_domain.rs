use std::{fmt::Debug, sync::Arc};

use chrono::Utc;
use log::*;

use crate::{
    api::{
        errors::OrderFlowError,
        order_objects::{OrderQueryFilter, PaidParams},
    },
    db::{
        sqlite::{orders, Session, SqliteDatabase},
        traits::OrderManagement,
    },
    db_types::{Order, OrderNo, OrderStatus, PaidRecord},
    events::{OrderEvent, OrderNotifier, ORDER_FINISH, ORDER_PAID},
    lock::{keys, LockManager},
};

/// `OrderDomainService` owns the `paid` transition of an order and the read side of the order aggregate.
///
/// It is the only code that writes `paid`, the per-channel totals and the `PartPaid`/`Paid` statuses, whether the
/// money arrives as cash at the till or as a provider callback.
pub struct OrderDomainService {
    db: SqliteDatabase,
    locks: LockManager,
    notifier: Arc<OrderNotifier>,
}

impl Debug for OrderDomainService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderDomainService")
    }
}

impl OrderDomainService {
    pub fn new(db: SqliteDatabase, locks: LockManager, notifier: Arc<OrderNotifier>) -> Self {
        Self { db, locks, notifier }
    }

    pub fn notifier(&self) -> &OrderNotifier {
        &self.notifier
    }

    /// Applies one payment to an order.
    ///
    /// The payment is checked with [`Order::can_paid`], added to the order and persisted. `order.paid` is then fired
    /// and, if the order is now fully paid, `finished_at` is stamped and `order.finish` is fired too. Both events run
    /// in the caller's transaction, so a handler failure undoes the payment.
    ///
    /// # Panics
    /// If `session` is not inside a transaction. Applying a payment outside a unit of work is a programming error.
    pub async fn paid(&self, session: &mut Session, params: PaidParams) -> Result<Order, OrderFlowError> {
        assert!(session.in_transaction(), "The paid transition of order {} requires a transaction", params.order_no);
        let mut order = orders::fetch_order(&params.order_no, session.conn())
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(params.order_no.clone()))?;
        order.can_paid(params.amount, params.channel)?;
        let record =
            PaidRecord { channel: params.channel, amount: params.amount, seq_no: params.seq_no, paid_at: Utc::now() };
        let status = order.apply_payment(record.clone());
        orders::update_order(&mut order, session.conn()).await?;
        info!("🧾️ Order {} received {} via {}. It is now {status}", order.order_no, record.amount, record.channel);
        let event = OrderEvent::new(order.clone(), params.operator.clone()).with_payment(record);
        self.notifier.fire(ORDER_PAID, session, &event).await?;
        if status == OrderStatus::Paid {
            order.finished_at = Some(Utc::now());
            orders::update_order(&mut order, session.conn()).await?;
            let event = OrderEvent::new(order.clone(), params.operator);
            self.notifier.fire(ORDER_FINISH, session, &event).await?;
            debug!("🧾️ Order {} is fully paid", order.order_no);
        }
        Ok(order)
    }

    /// Fetches an order with its items.
    pub async fn order(&self, order_no: &OrderNo) -> Result<Order, OrderFlowError> {
        self.db.fetch_order(order_no).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_no.clone()))
    }

    pub async fn orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        trace!("🧾️ Fetching orders. {filter}");
        let orders = self.db.fetch_orders(filter).await?;
        Ok(orders)
    }

    /// Collects the orders for an export, with their items.
    ///
    /// Exports are serialized per `export_id`, so a repeated request for the same export waits for (or is turned away
    /// by) the one in progress instead of running twice.
    pub async fn export(&self, export_id: &str, filter: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let guard = self.locks.acquire(keys::export(export_id)).await?;
        let result = self.export_locked(filter).await;
        guard.release().await;
        result
    }

    async fn export_locked(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let mut session = self.db.session().await?;
        let headers = orders::fetch_orders(filter, session.conn()).await?;
        let mut result = Vec::with_capacity(headers.len());
        for mut order in headers {
            order.items = orders::fetch_items(order.id, session.conn()).await?;
            result.push(order);
        }
        session.commit().await?;
        debug!("🧾️ Exported {} orders", result.len());
        Ok(result)
    }
}
