//! # Payment providers
//!
//! A provider initiates payments with a third-party gateway ([`PaymentProvider`]) and interprets the asynchronous
//! notifications that the gateway sends back ([`PaymentCallbackProvider`]). Providers are trait objects collected in a
//! [`ProviderRegistry`], so new gateways can be added without touching the payment domain service.
//!
//! Request and response payloads are opaque to the rest of the engine. They are persisted verbatim on the payment.
mod errors;
mod huifu;
mod registry;
mod transport;
mod zhixinhua;

use std::time::Duration;

use async_trait::async_trait;
pub use errors::ProviderError;
pub use huifu::{HuifuConfig, HuifuProvider, MICROPAY_PATH};
use pos_common::Money;
pub use registry::ProviderRegistry;
use serde::{Deserialize, Serialize};
pub use transport::{HttpTransport, MemoryTransport, ProviderTransport};
pub use zhixinhua::{ZhiXinHuaConfig, ZhiXinHuaPointsProvider, ZhiXinHuaWalletProvider, POINTS_PAY_PATH, WALLET_PAY_PATH};

use crate::db_types::{Payment, PaymentCallback, PaymentChannel, PaymentState, ProviderKind};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentParams {
    pub amount: Money,
    pub description: String,
    /// The payment code scanned from the customer's device.
    pub auth_code: Option<String>,
    /// Identifies the member whose points or wallet balance is charged.
    pub member_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentResult {
    pub request: String,
    pub response: String,
    /// The channel the gateway actually used, e.g. WeChat for a Huifu barcode payment.
    pub channel: PaymentChannel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub state: PaymentState,
    pub fail_reason: Option<String>,
    pub member_info: Option<String>,
}

/// Fixed-backoff retry for a condition expected to clear on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, delay: Duration::from_millis(500) }
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn provider(&self) -> ProviderKind;

    fn mch_id(&self) -> &str;

    async fn payment(&self, seq_no: &str, params: &PaymentParams) -> Result<PaymentResult, ProviderError>;
}

#[async_trait]
pub trait PaymentCallbackProvider: Send + Sync {
    /// Reads the payment sequence number out of a raw notification.
    fn seq_no(&self, payload: &str) -> Result<String, ProviderError>;

    /// Translates a notification into the common payment state.
    async fn callback(&self, callback: &PaymentCallback, payment: &Payment) -> Result<CallbackOutcome, ProviderError>;

    /// Set when this gateway may notify before the payment it refers to is visible in the database. The callback is
    /// then retried with this policy before the payment is treated as missing.
    fn visibility_retry(&self) -> Option<RetryPolicy> {
        None
    }
}

pub(crate) fn parse_payload<T: serde::de::DeserializeOwned>(payload: &str) -> Result<T, ProviderError> {
    serde_json::from_str(payload).map_err(|e| ProviderError::InvalidPayload(e.to_string()))
}
