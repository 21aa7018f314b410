//! ZhiXinHua membership payments: settling an order against a member's points or stored-value wallet.
//!
//! Both providers speak the same protocol and differ only in the endpoint and the channel they report. The wallet
//! gateway may notify before the payment row it refers to has been committed, so its callbacks are retried.
use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use log::*;
use pos_common::Money;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    db_types::{Payment, PaymentCallback, PaymentChannel, PaymentState, ProviderKind},
    providers::{
        parse_payload,
        CallbackOutcome,
        PaymentCallbackProvider,
        PaymentParams,
        PaymentProvider,
        PaymentResult,
        ProviderError,
        ProviderTransport,
        RetryPolicy,
    },
};

pub const POINTS_PAY_PATH: &str = "/api/points/pay";
pub const WALLET_PAY_PATH: &str = "/api/wallet/pay";
const SUCCESS_CODE: i64 = 0;

#[derive(Debug, Clone)]
pub struct ZhiXinHuaConfig {
    pub merchant_no: String,
    pub callback_retry: RetryPolicy,
}

impl ZhiXinHuaConfig {
    pub fn new<S: Into<String>>(merchant_no: S) -> Self {
        Self { merchant_no: merchant_no.into(), callback_retry: RetryPolicy::default() }
    }
}

#[derive(Debug, Deserialize)]
struct PayResponse {
    code: i64,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
struct Notification {
    out_trade_no: String,
    merchant_no: String,
    status: String,
    amount: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    member: Option<Value>,
}

/// The shared protocol. `path` and `channel` pick points or wallet.
struct ZhiXinHuaClient {
    config: ZhiXinHuaConfig,
    transport: Arc<dyn ProviderTransport>,
    path: &'static str,
    channel: PaymentChannel,
}

impl ZhiXinHuaClient {
    async fn pay(&self, seq_no: &str, params: &PaymentParams) -> Result<PaymentResult, ProviderError> {
        let member_token = params
            .member_token
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidRequest("a member token is required".into()))?;
        if !params.amount.is_positive() {
            return Err(ProviderError::InvalidRequest(format!("cannot charge {} to a member", params.amount)));
        }
        let body = json!({
            "merchant_no": self.config.merchant_no,
            "out_trade_no": seq_no,
            "member_token": member_token,
            "amount": params.amount.round2().to_string(),
            "subject": params.description,
        });
        let value = self.transport.post_json(self.path, &body).await?;
        let response: PayResponse =
            serde_json::from_value(value.clone()).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        if response.code != SUCCESS_CODE {
            debug!("💳️ ZhiXinHua rejected {seq_no}: {} {}", response.code, response.msg);
            return Err(ProviderError::Rejected { code: response.code.to_string(), message: response.msg });
        }
        Ok(PaymentResult { request: body.to_string(), response: value.to_string(), channel: self.channel })
    }

    fn interpret(&self, callback: &PaymentCallback, payment: &Payment) -> Result<CallbackOutcome, ProviderError> {
        let n: Notification = parse_payload(&callback.payload)?;
        let mismatch = |reason: String| ProviderError::CallbackMismatch { seq_no: payment.seq_no.clone(), reason };
        if n.out_trade_no != payment.seq_no {
            return Err(mismatch(format!("notification is for {}", n.out_trade_no)));
        }
        if n.merchant_no != payment.mch_id {
            return Err(mismatch(format!("merchant {} does not match", n.merchant_no)));
        }
        let amount = Money::from_str(&n.amount).map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
        if amount != payment.amount {
            return Err(mismatch(format!("amount {amount} does not match {}", payment.amount)));
        }
        let member_info = n.member.map(|m| m.to_string());
        match n.status.as_str() {
            "SUCCESS" => Ok(CallbackOutcome { state: PaymentState::Success, fail_reason: None, member_info }),
            "FAILED" => Ok(CallbackOutcome {
                state: PaymentState::Failure,
                fail_reason: Some(n.reason.unwrap_or_else(|| "payment failed".into())),
                member_info,
            }),
            "PENDING" => Ok(CallbackOutcome { state: PaymentState::Waiting, fail_reason: None, member_info }),
            s => Err(ProviderError::InvalidPayload(format!("unknown status {s}"))),
        }
    }
}

fn seq_no_of(payload: &str) -> Result<String, ProviderError> {
    parse_payload::<Notification>(payload).map(|n| n.out_trade_no)
}

pub struct ZhiXinHuaPointsProvider {
    client: ZhiXinHuaClient,
}

impl ZhiXinHuaPointsProvider {
    pub fn new(config: ZhiXinHuaConfig, transport: Arc<dyn ProviderTransport>) -> Self {
        let client = ZhiXinHuaClient { config, transport, path: POINTS_PAY_PATH, channel: PaymentChannel::Points };
        Self { client }
    }
}

#[async_trait]
impl PaymentProvider for ZhiXinHuaPointsProvider {
    fn provider(&self) -> ProviderKind {
        ProviderKind::ZhiXinHuaPoints
    }

    fn mch_id(&self) -> &str {
        &self.client.config.merchant_no
    }

    async fn payment(&self, seq_no: &str, params: &PaymentParams) -> Result<PaymentResult, ProviderError> {
        self.client.pay(seq_no, params).await
    }
}

#[async_trait]
impl PaymentCallbackProvider for ZhiXinHuaPointsProvider {
    fn seq_no(&self, payload: &str) -> Result<String, ProviderError> {
        seq_no_of(payload)
    }

    async fn callback(&self, callback: &PaymentCallback, payment: &Payment) -> Result<CallbackOutcome, ProviderError> {
        self.client.interpret(callback, payment)
    }
}

pub struct ZhiXinHuaWalletProvider {
    client: ZhiXinHuaClient,
}

impl ZhiXinHuaWalletProvider {
    pub fn new(config: ZhiXinHuaConfig, transport: Arc<dyn ProviderTransport>) -> Self {
        let client = ZhiXinHuaClient { config, transport, path: WALLET_PAY_PATH, channel: PaymentChannel::Wallet };
        Self { client }
    }
}

#[async_trait]
impl PaymentProvider for ZhiXinHuaWalletProvider {
    fn provider(&self) -> ProviderKind {
        ProviderKind::ZhiXinHuaWallet
    }

    fn mch_id(&self) -> &str {
        &self.client.config.merchant_no
    }

    async fn payment(&self, seq_no: &str, params: &PaymentParams) -> Result<PaymentResult, ProviderError> {
        self.client.pay(seq_no, params).await
    }
}

#[async_trait]
impl PaymentCallbackProvider for ZhiXinHuaWalletProvider {
    fn seq_no(&self, payload: &str) -> Result<String, ProviderError> {
        seq_no_of(payload)
    }

    async fn callback(&self, callback: &PaymentCallback, payment: &Payment) -> Result<CallbackOutcome, ProviderError> {
        self.client.interpret(callback, payment)
    }

    fn visibility_retry(&self) -> Option<RetryPolicy> {
        Some(self.client.config.callback_retry)
    }
}
