use thiserror::Error;

use crate::api::ErrorKind;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(String),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("Dining table {0} does not exist")]
    TableNotFound(i64),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Product {0} is not available for sale")]
    ProductUnavailable(i64),
    #[error("Product {product_id} has no spec {spec_id}")]
    SpecNotFound { product_id: i64, spec_id: i64 },
    #[error("Product {product_id} has no option {option_id}")]
    OptionNotFound { product_id: i64, option_id: i64 },
    #[error("Cart item {0} does not exist")]
    CartItemNotFound(i64),
    #[error("Cannot process duplicate payment {0}")]
    DuplicatePayment(String),
}

impl SqliteDatabaseError {
    pub fn kind(&self) -> ErrorKind {
        use SqliteDatabaseError::*;
        match self {
            DriverError(e) if is_unique_violation(e) => ErrorKind::Conflict,
            DriverError(_) | MigrationError(_) | QueryError(_) => ErrorKind::Internal,
            OrderNotFound(_) |
            PaymentNotFound(_) |
            TableNotFound(_) |
            ProductNotFound(_) |
            SpecNotFound { .. } |
            OptionNotFound { .. } |
            CartItemNotFound(_) => ErrorKind::NotFound,
            ProductUnavailable(_) => ErrorKind::Business,
            DuplicatePayment(_) => ErrorKind::Conflict,
        }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error().map(|d| d.is_unique_violation()).unwrap_or(false)
}
