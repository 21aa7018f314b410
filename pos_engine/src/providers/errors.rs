use thiserror::Error;

use crate::{api::ErrorKind, db_types::ProviderKind};

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Payment provider {0} is not configured")]
    Unsupported(ProviderKind),
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),
    #[error("The provider rejected the payment ({code}): {message}")]
    Rejected { code: String, message: String },
    #[error("Could not reach the payment provider: {0}")]
    Transport(String),
    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
    #[error("Malformed callback payload: {0}")]
    InvalidPayload(String),
    #[error("Callback does not match payment {seq_no}: {reason}")]
    CallbackMismatch { seq_no: String, reason: String },
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Unsupported(_) |
            ProviderError::InvalidRequest(_) |
            ProviderError::Rejected { .. } |
            ProviderError::InvalidPayload(_) |
            ProviderError::CallbackMismatch { .. } => ErrorKind::Business,
            ProviderError::Transport(_) | ProviderError::InvalidResponse(_) => ErrorKind::Internal,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}
