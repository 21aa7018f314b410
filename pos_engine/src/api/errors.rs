use std::fmt::Display;

use pos_common::Money;
use thiserror::Error;

use super::order_rules::{MAX_ITEM_QUANTITY, MAX_UNIT_PRICE};
use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{OrderNo, OrderStatus},
    events::HandlerError,
    lock::LockError,
    providers::ProviderError,
};

/// The coarse classification every error in the engine maps onto. The server turns these into status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request broke a business rule or failed validation.
    Business,
    NotFound,
    /// The request collided with existing state, e.g. a duplicate sequence number.
    Conflict,
    /// Another operation holds the lock on the resource.
    LockContention,
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Business => write!(f, "business"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::LockContention => write!(f, "lock_contention"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Violations of the order state machine and its arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderRuleError {
    #[error("Order {order_no} is {status} and can no longer be modified")]
    NotMutable { order_no: OrderNo, status: OrderStatus },
    #[error("Order {0} has a payment in progress")]
    PaymentInFlight(OrderNo),
    #[error("Order {order_no} is {status} and cannot accept payments")]
    NotPayable { order_no: OrderNo, status: OrderStatus },
    #[error("Payment amount {0} must be positive")]
    InvalidAmount(Money),
    #[error("Payment of {amount} exceeds the remaining {remaining}")]
    Overpayment { amount: Money, remaining: Money },
    #[error("Discount {discount} must be between zero and the total price {total}")]
    InvalidDiscount { discount: Money, total: Money },
    #[error("Price {0} must be between zero and {max}", max = MAX_UNIT_PRICE)]
    InvalidPrice(Money),
    #[error("Quantity must be positive and at most {max}", max = MAX_ITEM_QUANTITY)]
    InvalidQuantity,
    #[error("The order total is too large")]
    AmountOverflow,
    #[error("An order needs at least one item")]
    NoItems,
    #[error("Order item {0} does not exist")]
    ItemNotFound(i64),
    #[error("Order {0} is already at table {1}")]
    SameTable(OrderNo, i64),
    #[error("Table {table_id} does not belong to store {store_id}")]
    ForeignTable { table_id: i64, store_id: i64 },
    #[error("Order {order_no} is {status}. Only paid orders can be completed")]
    NotPaid { order_no: OrderNo, status: OrderStatus },
}

impl OrderRuleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderRuleError::ItemNotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Business,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderNo),
    #[error("Dining table {0} does not exist")]
    TableNotFound(i64),
    #[error("The cart for table {0} is empty")]
    CartEmpty(i64),
    #[error("{0}")]
    Rule(#[from] OrderRuleError),
    #[error("{0}")]
    Lock(#[from] LockError),
    #[error("{0}")]
    Database(#[from] SqliteDatabaseError),
    #[error("{0}")]
    Handler(#[from] HandlerError),
    #[error("{0}")]
    Payment(Box<PaymentError>),
}

impl OrderFlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderFlowError::OrderNotFound(_) | OrderFlowError::TableNotFound(_) => ErrorKind::NotFound,
            OrderFlowError::CartEmpty(_) => ErrorKind::Business,
            OrderFlowError::Rule(e) => e.kind(),
            OrderFlowError::Lock(e) => e.kind(),
            OrderFlowError::Database(e) => e.kind(),
            OrderFlowError::Handler(e) => e.kind(),
            OrderFlowError::Payment(e) => e.kind(),
        }
    }
}

impl From<PaymentError> for OrderFlowError {
    fn from(e: PaymentError) -> Self {
        OrderFlowError::Payment(Box::new(e))
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("Payment {0} has already finished")]
    AlreadyFinished(String),
    #[error("Payment {seq_no} cannot move from {from} to {to}")]
    InvalidTransition { seq_no: String, from: String, to: String },
    #[error("{0}")]
    Provider(#[from] ProviderError),
    #[error("{0}")]
    Lock(#[from] LockError),
    #[error("{0}")]
    Database(#[from] SqliteDatabaseError),
    #[error("{0}")]
    Handler(#[from] HandlerError),
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::PaymentNotFound(_) => ErrorKind::NotFound,
            PaymentError::AlreadyFinished(_) => ErrorKind::Conflict,
            PaymentError::InvalidTransition { .. } => ErrorKind::Business,
            PaymentError::Provider(e) => e.kind(),
            PaymentError::Lock(e) => e.kind(),
            PaymentError::Database(e) => e.kind(),
            PaymentError::Handler(e) => e.kind(),
        }
    }
}
