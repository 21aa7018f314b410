use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderItem, PaidRecord, Payment},
    operator::Operator,
};

pub const ORDER_CREATE: &str = "order.create";
pub const ORDER_PAID: &str = "order.paid";
pub const ORDER_CANCEL: &str = "order.cancel";
pub const ORDER_TURN_TABLE: &str = "order.turn_table";
pub const ORDER_APPEND_ITEM: &str = "order.append_item";
pub const ORDER_REMOVE_ITEM: &str = "order.remove_item";
pub const ORDER_CHANGE_PRICE: &str = "order.change_price";
pub const ORDER_DISCOUNT: &str = "order.discount";
pub const ORDER_FINISH: &str = "order.finish";
pub const PAYMENT_SUCCESS: &str = "payment.success";

/// Every order event name, in no particular order.
pub const ALL_ORDER_EVENTS: [&str; 9] = [
    ORDER_CREATE,
    ORDER_PAID,
    ORDER_CANCEL,
    ORDER_TURN_TABLE,
    ORDER_APPEND_ITEM,
    ORDER_REMOVE_ITEM,
    ORDER_CHANGE_PRICE,
    ORDER_DISCOUNT,
    ORDER_FINISH,
];

/// The payload of every order event. `order` is the state after the mutation, as persisted in the current
/// transaction.
#[derive(Debug, Clone, Serialize)]
pub struct OrderEvent {
    pub order: Order,
    /// The items that the operation touched: appended, removed or repriced.
    pub operated_items: Option<Vec<OrderItem>>,
    pub operator: Operator,
    /// Set on `order.turn_table` to the table the order moved away from.
    pub previous_table_id: Option<i64>,
    /// Set on `order.paid` to the payment that was applied.
    pub payment: Option<PaidRecord>,
}

impl OrderEvent {
    pub fn new(order: Order, operator: Operator) -> Self {
        Self { order, operated_items: None, operator, previous_table_id: None, payment: None }
    }

    pub fn with_items(mut self, items: Vec<OrderItem>) -> Self {
        self.operated_items = Some(items);
        self
    }

    pub fn with_previous_table(mut self, table_id: Option<i64>) -> Self {
        self.previous_table_id = table_id;
        self
    }

    pub fn with_payment(mut self, payment: PaidRecord) -> Self {
        self.payment = Some(payment);
        self
    }
}

#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub payment: Payment,
    pub operator: Operator,
}

impl PaymentEvent {
    pub fn new(payment: Payment, operator: Operator) -> Self {
        Self { payment, operator }
    }
}

/// The record published to downstream consumers after an order event commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "type")]
    pub event_type: String,
    pub order: Order,
    pub operated_items: Option<Vec<OrderItem>>,
}

impl StreamRecord {
    pub fn new(event_type: &str, event: &OrderEvent) -> Self {
        Self {
            event_type: event_type.to_string(),
            order: event.order.clone(),
            operated_items: event.operated_items.clone(),
        }
    }
}
