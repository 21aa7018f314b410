use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use pos_engine::{ErrorKind, OrderFlowError, PaymentError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Operator headers are missing or invalid. {0}")]
    InvalidOperator(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("The callback job queue has shut down")]
    QueueClosed,
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    OrderFlow(#[from] OrderFlowError),
    #[error("{0}")]
    Payment(#[from] PaymentError),
}

impl ServerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequestBody(_) | Self::InvalidRequestPath(_) | Self::InvalidOperator(_) => ErrorKind::Business,
            Self::OrderFlow(e) => e.kind(),
            Self::Payment(e) => e.kind(),
            Self::InitializeError(_) | Self::IOError(_) | Self::QueueClosed | Self::Unspecified(_) => {
                ErrorKind::Internal
            },
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Business => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::LockContention => StatusCode::LOCKED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("💻️ {self}");
        }
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string(), "kind": self.kind().to_string() }).to_string())
    }
}
