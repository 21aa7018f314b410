use thiserror::Error;

use crate::{
    api::{ErrorKind, OrderFlowError},
    db::sqlite::SqliteDatabaseError,
};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Dining table {0}: table already occupied")]
    TableOccupied(i64),
    #[error("Dining table {0}: table state invalid")]
    TableStateInvalid(i64),
    #[error("Dining table {0} does not exist")]
    TableNotFound(i64),
    #[error("Event payload is missing {0}")]
    MissingPayload(&'static str),
    #[error("Could not serialize event: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Database(#[from] SqliteDatabaseError),
    #[error("Order transition failed. {0}")]
    Order(Box<OrderFlowError>),
}

impl HandlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::TableOccupied(_) | HandlerError::TableStateInvalid(_) => ErrorKind::Business,
            HandlerError::TableNotFound(_) => ErrorKind::NotFound,
            HandlerError::MissingPayload(_) | HandlerError::Serialization(_) => ErrorKind::Internal,
            HandlerError::Database(e) => e.kind(),
            HandlerError::Order(e) => e.kind(),
        }
    }
}

impl From<OrderFlowError> for HandlerError {
    fn from(e: OrderFlowError) -> Self {
        HandlerError::Order(Box::new(e))
    }
}
