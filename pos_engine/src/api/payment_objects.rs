use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{BusinessType, Payment, ProviderKind},
    providers::PaymentParams,
};

/// A request to start a payment with a provider for some business entity.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub provider: ProviderKind,
    pub business_type: BusinessType,
    pub business_id: String,
    pub params: PaymentParams,
}

/// A unit of work for the callback job queue: one stored notification to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackJob {
    pub callback_id: i64,
    pub seq_no: String,
}

impl Display for CallbackJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "callback #{} for payment {}", self.callback_id, self.seq_no)
    }
}

/// What processing a callback job did.
#[derive(Debug, Clone)]
pub enum CallbackResult {
    /// The notification moved the payment to a new state.
    Applied(Payment),
    /// The callback row was already consumed by an earlier delivery of the job.
    AlreadyHandled,
    /// No payment with the callback's sequence number exists.
    PaymentMissing,
    /// The payment had already reached a terminal state. The notification was discarded.
    AlreadyFinished(Payment),
}

impl CallbackResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, CallbackResult::Applied(_))
    }
}
