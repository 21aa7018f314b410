//! Huifu aggregated payments: WeChat, Alipay and UnionPay barcode payments through one merchant account.
use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use log::*;
use pos_common::Money;
use serde::Deserialize;
use serde_json::json;

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
    },
};

pub const MICROPAY_PATH: &str = "/v2/trade/payment/micropay";
const ACCEPTED_CODES: [&str; 2] = ["00000000", "00000100"];

#[derive(Debug, Clone)]
pub struct HuifuConfig {
    /// The merchant's `huifu_id`.
    pub mch_id: String,
}

pub struct HuifuProvider {
    config: HuifuConfig,
    transport: Arc<dyn ProviderTransport>,
}

#[derive(Debug, Deserialize)]
struct MicropayResponse {
    resp_code: String,
    #[serde(default)]
    resp_desc: String,
    trade_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Notification {
    req_seq_id: String,
    huifu_id: String,
    trans_amt: String,
    trans_stat: String,
    #[serde(default)]
    resp_desc: Option<String>,
    #[serde(default)]
    bank_message: Option<String>,
}

impl HuifuProvider {
    pub fn new(config: HuifuConfig, transport: Arc<dyn ProviderTransport>) -> Self {
        Self { config, transport }
    }
}

/// Barcode prefixes assigned to each wallet.
fn channel_from_auth_code(code: &str) -> Option<PaymentChannel> {
    let prefix = code.get(0..2)?.parse::<u8>().ok()?;
    match prefix {
        10..=15 => Some(PaymentChannel::WeChat),
        25..=30 => Some(PaymentChannel::Alipay),
        62 => Some(PaymentChannel::UnionPay),
        _ => None,
    }
}

fn channel_from_trade_type(trade_type: &str) -> Option<PaymentChannel> {
    match trade_type.split('_').next()? {
        "T" => Some(PaymentChannel::WeChat),
        "A" => Some(PaymentChannel::Alipay),
        "U" => Some(PaymentChannel::UnionPay),
        _ => None,
    }
}

#[async_trait]
impl PaymentProvider for HuifuProvider {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Huifu
    }

    fn mch_id(&self) -> &str {
        &self.config.mch_id
    }

    async fn payment(&self, seq_no: &str, params: &PaymentParams) -> Result<PaymentResult, ProviderError> {
        let auth_code = params
            .auth_code
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidRequest("a payment code is required".into()))?;
        let body = json!({
            "req_seq_id": seq_no,
            "req_date": Utc::now().format("%Y%m%d").to_string(),
            "huifu_id": self.config.mch_id,
            "trans_amt": params.amount.round2().to_string(),
            "goods_desc": params.description,
            "auth_code": auth_code,
        });
        let value = self.transport.post_json(MICROPAY_PATH, &body).await?;
        let response: MicropayResponse =
            serde_json::from_value(value.clone()).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        if !ACCEPTED_CODES.contains(&response.resp_code.as_str()) {
            debug!("💳️ Huifu rejected {seq_no}: {} {}", response.resp_code, response.resp_desc);
            return Err(ProviderError::Rejected { code: response.resp_code, message: response.resp_desc });
        }
        let channel = response
            .trade_type
            .as_deref()
            .and_then(channel_from_trade_type)
            .or_else(|| channel_from_auth_code(auth_code))
            .ok_or_else(|| ProviderError::InvalidResponse(format!("cannot tell the channel of payment {seq_no}")))?;
        Ok(PaymentResult { request: body.to_string(), response: value.to_string(), channel })
    }
}

#[async_trait]
impl PaymentCallbackProvider for HuifuProvider {
    fn seq_no(&self, payload: &str) -> Result<String, ProviderError> {
        parse_payload::<Notification>(payload).map(|n| n.req_seq_id)
    }

    async fn callback(&self, callback: &PaymentCallback, payment: &Payment) -> Result<CallbackOutcome, ProviderError> {
        let n: Notification = parse_payload(&callback.payload)?;
        let mismatch = |reason: String| ProviderError::CallbackMismatch { seq_no: payment.seq_no.clone(), reason };
        if n.req_seq_id != payment.seq_no {
            return Err(mismatch(format!("notification is for {}", n.req_seq_id)));
        }
        if n.huifu_id != payment.mch_id {
            return Err(mismatch(format!("merchant {} does not match", n.huifu_id)));
        }
        let amount = Money::from_str(&n.trans_amt).map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
        if amount != payment.amount {
            return Err(mismatch(format!("amount {amount} does not match {}", payment.amount)));
        }
        let outcome = match n.trans_stat.as_str() {
            "S" => CallbackOutcome { state: PaymentState::Success, fail_reason: None, member_info: None },
            "F" => CallbackOutcome {
                state: PaymentState::Failure,
                fail_reason: n.bank_message.or(n.resp_desc).or_else(|| Some("payment failed".into())),
                member_info: None,
            },
            "P" => CallbackOutcome { state: PaymentState::Waiting, fail_reason: None, member_info: None },
            s => return Err(ProviderError::InvalidPayload(format!("unknown trans_stat {s}"))),
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::{
        db_types::{BusinessType, ProviderKind},
        providers::MemoryTransport,
    };

    fn payment(seq_no: &str, amount: Money) -> Payment {
        Payment {
            id: 1,
            seq_no: seq_no.into(),
            provider: ProviderKind::Huifu,
            channel: PaymentChannel::WeChat,
            state: PaymentState::Processing,
            amount,
            business_type: BusinessType::Order,
            business_id: "OD1".into(),
            mch_id: "6666000123".into(),
            request: None,
            response: None,
            callback_payload: None,
            fail_reason: None,
            member_info: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            finished_at: None,
        }
    }

    fn callback(payload: serde_json::Value) -> PaymentCallback {
        PaymentCallback {
            id: 1,
            seq_no: "PY1".into(),
            provider: ProviderKind::Huifu,
            payload: payload.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn auth_code_prefixes() {
        assert_eq!(channel_from_auth_code("134567890123456789"), Some(PaymentChannel::WeChat));
        assert_eq!(channel_from_auth_code("284567890123456789"), Some(PaymentChannel::Alipay));
        assert_eq!(channel_from_auth_code("6234567890123456789"), Some(PaymentChannel::UnionPay));
        assert_eq!(channel_from_auth_code("99"), None);
        assert_eq!(channel_from_auth_code("x"), None);
    }

    #[tokio::test]
    async fn payment_resolves_channel_from_trade_type() {
        let transport = Arc::new(MemoryTransport::new());
        transport.push_response(
            MICROPAY_PATH,
            Ok(json!({"resp_code": "00000100", "resp_desc": "processing", "trade_type": "A_MICROPAY"})),
        );
        let provider = HuifuProvider::new(HuifuConfig { mch_id: "6666000123".into() }, transport.clone());
        let params = PaymentParams {
            amount: Money::from_cents(1250),
            description: "Order OD1".into(),
            auth_code: Some("134567890123456789".into()),
            member_token: None,
        };
        let result = provider.payment("PY1", &params).await.unwrap();
        assert_eq!(result.channel, PaymentChannel::Alipay);
        let (path, body) = &transport.requests()[0];
        assert_eq!(path, MICROPAY_PATH);
        assert_eq!(body["trans_amt"], "12.50");
        assert_eq!(body["req_seq_id"], "PY1");
    }

    #[tokio::test]
    async fn rejected_payment_is_an_error() {
        let transport = Arc::new(MemoryTransport::new());
        transport.push_response(MICROPAY_PATH, Ok(json!({"resp_code": "10000000", "resp_desc": "bad code"})));
        let provider = HuifuProvider::new(HuifuConfig { mch_id: "m".into() }, transport);
        let params = PaymentParams { auth_code: Some("13".into()), ..Default::default() };
        let err = provider.payment("PY1", &params).await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { ref code, .. } if code == "10000000"));
        let err = provider.payment("PY2", &PaymentParams::default()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn callback_states() {
        let provider = HuifuProvider::new(HuifuConfig { mch_id: "6666000123".into() }, Arc::new(MemoryTransport::new()));
        let p = payment("PY1", Money::from(10));
        let base = json!({"req_seq_id": "PY1", "huifu_id": "6666000123", "trans_amt": "10.00"});
        let with = |stat: &str| {
            let mut v = base.clone();
            v["trans_stat"] = json!(stat);
            v["bank_message"] = json!("insufficient funds");
            callback(v)
        };
        assert_eq!(provider.callback(&with("S"), &p).await.unwrap().state, PaymentState::Success);
        let failed = provider.callback(&with("F"), &p).await.unwrap();
        assert_eq!(failed.state, PaymentState::Failure);
        assert_eq!(failed.fail_reason.as_deref(), Some("insufficient funds"));
        assert_eq!(provider.callback(&with("P"), &p).await.unwrap().state, PaymentState::Waiting);
        assert!(matches!(provider.callback(&with("Z"), &p).await, Err(ProviderError::InvalidPayload(_))));
        assert_eq!(provider.seq_no(&with("S").payload).unwrap(), "PY1");
    }

    #[tokio::test]
    async fn callback_for_wrong_amount_is_rejected() {
        let provider = HuifuProvider::new(HuifuConfig { mch_id: "6666000123".into() }, Arc::new(MemoryTransport::new()));
        let p = payment("PY1", Money::from(10));
        let cb = callback(json!({"req_seq_id": "PY1", "huifu_id": "6666000123", "trans_amt": "1.00", "trans_stat": "S"}));
        assert!(matches!(provider.callback(&cb, &p).await, Err(ProviderError::CallbackMismatch { .. })));
        assert!(matches!(provider.seq_no("not json"), Err(ProviderError::InvalidPayload(_))));
    }
}
