//! The order state machine and the arithmetic that keeps an order's prices consistent.
//!
//! Nothing here touches the database. The services load an order, apply these rules and persist the result inside one
//! unit of work.
use chrono::Utc;
use pos_common::{Money, Quantity};
use sqlx::types::Json;

use crate::{
    api::{errors::OrderRuleError, order_objects::NewOrder},
    db_types::{Order, OrderItem, OrderNo, OrderStatus, PaidRecord, PaymentChannel},
    operator::Operator,
};

/// Largest quantity a single line may carry.
pub const MAX_ITEM_QUANTITY: i64 = 100_000;
/// Largest unit price an operator may set on a line.
pub const MAX_UNIT_PRICE: i64 = 10_000_000;

pub fn check_quantity(quantity: Quantity) -> Result<(), OrderRuleError> {
    if !quantity.is_positive() || quantity > Quantity::from(MAX_ITEM_QUANTITY) {
        return Err(OrderRuleError::InvalidQuantity);
    }
    Ok(())
}

pub fn check_unit_price(price: Money) -> Result<(), OrderRuleError> {
    if price.is_negative() || price > Money::from(MAX_UNIT_PRICE) {
        return Err(OrderRuleError::InvalidPrice(price));
    }
    Ok(())
}

impl Order {
    /// A fresh `Unpaid` order with its totals computed from `items`.
    pub fn open(
        order_no: OrderNo,
        request: &NewOrder,
        items: Vec<OrderItem>,
        creator: &Operator,
    ) -> Result<Self, OrderRuleError> {
        let now = Utc::now();
        let mut order = Order {
            id: 0,
            order_no,
            store_id: request.store_id,
            table_id: request.table_id,
            status: OrderStatus::Unpaid,
            total_price: Money::ZERO,
            discount: Money::ZERO,
            real_price: Money::ZERO,
            paid: Money::ZERO,
            cash_paid: Money::ZERO,
            online_paid: Money::ZERO,
            point_paid: Money::ZERO,
            wallet_paid: Money::ZERO,
            paid_channels: Json(Vec::new()),
            remark: request.remark.clone(),
            creator_type: creator.operator_type(),
            creator_id: creator.id(),
            creator_name: creator.name().to_string(),
            created_at: now,
            updated_at: now,
            last_paid_at: None,
            finished_at: None,
            cancelled_at: None,
            cancel_reason: None,
            items,
        };
        order.recalculate()?;
        Ok(order)
    }

    /// The guard in front of every content change: the order must be `Unpaid` with no payment in flight.
    pub fn ensure_mutable(&self, has_incomplete_payment: bool) -> Result<(), OrderRuleError> {
        if self.status != OrderStatus::Unpaid {
            return Err(OrderRuleError::NotMutable { order_no: self.order_no.clone(), status: self.status });
        }
        if has_incomplete_payment {
            return Err(OrderRuleError::PaymentInFlight(self.order_no.clone()));
        }
        Ok(())
    }

    /// Checks that a payment of `amount` through `channel` may be applied.
    ///
    /// The amount must be positive and must not exceed the remaining due. A zero cash payment is accepted only when
    /// nothing is due, which is how fully discounted orders are closed.
    pub fn can_paid(&self, amount: Money, channel: PaymentChannel) -> Result<(), OrderRuleError> {
        if !matches!(self.status, OrderStatus::Unpaid | OrderStatus::PartPaid) {
            return Err(OrderRuleError::NotPayable { order_no: self.order_no.clone(), status: self.status });
        }
        let remaining = self.remaining_due();
        let zero_settlement = amount.is_zero() && remaining.is_zero() && channel == PaymentChannel::Cash;
        if !amount.is_positive() && !zero_settlement {
            return Err(OrderRuleError::InvalidAmount(amount));
        }
        if amount > remaining {
            return Err(OrderRuleError::Overpayment { amount, remaining });
        }
        Ok(())
    }

    /// Recomputes `total_price` from the items and `real_price` from the total. A discount larger than the new total is
    /// clamped to it.
    pub fn recalculate(&mut self) -> Result<(), OrderRuleError> {
        self.total_price =
            Money::checked_sum(self.items.iter().map(|i| i.amount)).ok_or(OrderRuleError::AmountOverflow)?;
        if self.discount > self.total_price {
            self.discount = self.total_price;
        }
        self.real_price = (self.total_price - self.discount).clamp_zero();
        Ok(())
    }

    pub fn set_discount(&mut self, discount: Money) -> Result<(), OrderRuleError> {
        if discount.is_negative() || discount > self.total_price {
            return Err(OrderRuleError::InvalidDiscount { discount, total: self.total_price });
        }
        self.discount = discount;
        self.recalculate()
    }

    /// Adds the payment to `paid`, the channel total and the payment history, and moves the status to `PartPaid` or
    /// `Paid`. Callers must have checked [`Order::can_paid`].
    pub fn apply_payment(&mut self, record: PaidRecord) -> OrderStatus {
        let amount = record.amount;
        self.paid += amount;
        match record.channel {
            PaymentChannel::Cash => self.cash_paid += amount,
            PaymentChannel::WeChat | PaymentChannel::Alipay | PaymentChannel::UnionPay => self.online_paid += amount,
            PaymentChannel::Points => self.point_paid += amount,
            PaymentChannel::Wallet => self.wallet_paid += amount,
        }
        self.last_paid_at = Some(record.paid_at);
        self.paid_channels.0.push(record);
        self.status = if self.paid >= self.real_price { OrderStatus::Paid } else { OrderStatus::PartPaid };
        self.status
    }

    pub fn item_mut(&mut self, item_id: i64) -> Result<&mut OrderItem, OrderRuleError> {
        self.items.iter_mut().find(|i| i.id == item_id).ok_or(OrderRuleError::ItemNotFound(item_id))
    }
}
