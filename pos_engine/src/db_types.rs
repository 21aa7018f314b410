use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use pos_common::{Money, Quantity};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

use crate::{
    api::OrderRuleError,
    operator::{Operator, OperatorType},
};

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

//--------------------------------------        OrderNo        ---------------------------------------------------------
/// The human-readable, unique identity of an order, e.g. `OD2024051600042`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNo(pub String);

impl FromStr for OrderNo {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNo {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNo {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderNo {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      OrderStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Newly created. The only state in which the order contents may change.
    Unpaid,
    /// At least one payment has been applied but the real price is not yet covered.
    PartPaid,
    /// The real price has been covered in full.
    Paid,
    /// Closed out by an operator after being paid.
    Finished,
    /// Abandoned before any payment was applied.
    Cancelled,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Unpaid => write!(f, "Unpaid"),
            OrderStatus::PartPaid => write!(f, "PartPaid"),
            OrderStatus::Paid => write!(f, "Paid"),
            OrderStatus::Finished => write!(f, "Finished"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unpaid" => Ok(Self::Unpaid),
            "PartPaid" => Ok(Self::PartPaid),
            "Paid" => Ok(Self::Paid),
            "Finished" => Ok(Self::Finished),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError::new("order status", s)),
        }
    }
}

//--------------------------------------    PaymentChannel     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PaymentChannel {
    Cash,
    WeChat,
    Alipay,
    UnionPay,
    Points,
    Wallet,
}

impl PaymentChannel {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::WeChat | Self::Alipay | Self::UnionPay)
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Self::Points)
    }
}

impl Display for PaymentChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentChannel::Cash => write!(f, "Cash"),
            PaymentChannel::WeChat => write!(f, "WeChat"),
            PaymentChannel::Alipay => write!(f, "Alipay"),
            PaymentChannel::UnionPay => write!(f, "UnionPay"),
            PaymentChannel::Points => write!(f, "Points"),
            PaymentChannel::Wallet => write!(f, "Wallet"),
        }
    }
}

/// One entry in an order's payment history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidRecord {
    pub channel: PaymentChannel,
    pub amount: Money,
    /// The payment sequence number for provider-backed payments. Cash has none.
    pub seq_no: Option<String>,
    pub paid_at: DateTime<Utc>,
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_no: OrderNo,
    pub store_id: i64,
    pub table_id: Option<i64>,
    pub status: OrderStatus,
    pub total_price: Money,
    pub discount: Money,
    pub real_price: Money,
    pub paid: Money,
    pub cash_paid: Money,
    pub online_paid: Money,
    pub point_paid: Money,
    pub wallet_paid: Money,
    pub paid_channels: Json<Vec<PaidRecord>>,
    pub remark: Option<String>,
    pub creator_type: OperatorType,
    pub creator_id: i64,
    pub creator_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_paid_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn creator(&self) -> Operator {
        Operator::from_parts(self.creator_type, self.creator_id, &self.creator_name)
    }

    pub fn remaining_due(&self) -> Money {
        (self.real_price - self.paid).clamp_zero()
    }

    pub fn item(&self, item_id: i64) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.id == item_id)
    }
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OptionKind {
    /// A selectable attribute, e.g. "large" or "extra spicy".
    Attribute,
    /// A recipe add-on, e.g. "extra cheese".
    Recipe,
}

/// Point-in-time copy of a product option at the moment it was ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOption {
    pub option_id: i64,
    pub kind: OptionKind,
    pub name: String,
    pub extra_price: Money,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub spec_id: Option<i64>,
    pub spec_name: Option<String>,
    pub unit_price: Money,
    pub options: Json<Vec<ItemOption>>,
    pub quantity: Quantity,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// `round2((unit_price + Σ option extras) × quantity)`, or `None` if that does not fit in a decimal.
    pub fn compute_amount(unit_price: Money, options: &[ItemOption], quantity: Quantity) -> Option<Money> {
        let extras = Money::checked_sum(options.iter().map(|o| o.extra_price))?;
        let amount = unit_price.checked_add(extras)?.checked_mul(quantity)?;
        Some(amount.round2())
    }

    pub fn recalculate(&mut self) -> Result<(), OrderRuleError> {
        self.amount =
            Self::compute_amount(self.unit_price, &self.options, self.quantity).ok_or(OrderRuleError::AmountOverflow)?;
        Ok(())
    }
}

//--------------------------------------     PaymentState      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PaymentState {
    Unknown,
    Processing,
    Success,
    Failure,
    Waiting,
}

impl PaymentState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    /// Payment states only move forward.
    pub fn can_transition_to(&self, next: PaymentState) -> bool {
        use PaymentState::*;
        match (self, next) {
            (Unknown, _) => true,
            (Processing, Success | Failure | Waiting) => true,
            (Waiting, Success | Failure | Waiting) => true,
            _ => false,
        }
    }
}

impl Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentState::Unknown => write!(f, "Unknown"),
            PaymentState::Processing => write!(f, "Processing"),
            PaymentState::Success => write!(f, "Success"),
            PaymentState::Failure => write!(f, "Failure"),
            PaymentState::Waiting => write!(f, "Waiting"),
        }
    }
}

//--------------------------------------     ProviderKind      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum ProviderKind {
    Huifu,
    ZhiXinHuaPoints,
    ZhiXinHuaWallet,
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Huifu => write!(f, "huifu"),
            ProviderKind::ZhiXinHuaPoints => write!(f, "zxh_points"),
            ProviderKind::ZhiXinHuaWallet => write!(f, "zxh_wallet"),
        }
    }
}

impl ProviderKind {
    /// The channel a payment through this provider is checked against before the provider reports the real one.
    pub fn nominal_channel(&self) -> PaymentChannel {
        match self {
            ProviderKind::Huifu => PaymentChannel::WeChat,
            ProviderKind::ZhiXinHuaPoints => PaymentChannel::Points,
            ProviderKind::ZhiXinHuaWallet => PaymentChannel::Wallet,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "huifu" => Ok(Self::Huifu),
            "zxh_points" | "zhixinhuapoints" => Ok(Self::ZhiXinHuaPoints),
            "zxh_wallet" | "zhixinhuawallet" => Ok(Self::ZhiXinHuaWallet),
            _ => Err(ConversionError::new("payment provider", s)),
        }
    }
}

//--------------------------------------     BusinessType      ---------------------------------------------------------
/// What a payment is settling. Orders are the only business type this core drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum BusinessType {
    Order,
}

impl Display for BusinessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusinessType::Order => write!(f, "Order"),
        }
    }
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub seq_no: String,
    pub provider: ProviderKind,
    pub channel: PaymentChannel,
    pub state: PaymentState,
    pub amount: Money,
    pub business_type: BusinessType,
    pub business_id: String,
    pub mch_id: String,
    /// The raw provider request, stored verbatim.
    pub request: Option<String>,
    /// The raw provider response to the request, stored verbatim. Written once when the payment is created.
    pub response: Option<String>,
    /// The raw notification that last moved the payment to a new state.
    pub callback_payload: Option<String>,
    pub fail_reason: Option<String>,
    pub member_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub seq_no: String,
    pub provider: ProviderKind,
    pub channel: PaymentChannel,
    pub amount: Money,
    pub business_type: BusinessType,
    pub business_id: String,
    pub mch_id: String,
    pub request: String,
    pub response: String,
}

//--------------------------------------    PaymentCallback    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentCallback {
    pub id: i64,
    pub seq_no: String,
    pub provider: ProviderKind,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      DiningTable      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TableStatus {
    Free,
    Occupied,
    Disabled,
}

impl Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableStatus::Free => write!(f, "Free"),
            TableStatus::Occupied => write!(f, "Occupied"),
            TableStatus::Disabled => write!(f, "Disabled"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DiningTable {
    pub id: i64,
    pub store_id: i64,
    pub name: String,
    pub status: TableStatus,
    pub order_no: Option<OrderNo>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       CartItem        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub table_id: i64,
    pub product_id: i64,
    pub spec_id: Option<i64>,
    pub option_ids: Json<Vec<i64>>,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        Catalog        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub store_id: i64,
    pub name: String,
    pub price: Money,
    pub enabled: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductSpec {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub price: Money,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductOption {
    pub id: i64,
    pub product_id: i64,
    pub kind: OptionKind,
    pub name: String,
    pub extra_price: Money,
}

impl From<ProductOption> for ItemOption {
    fn from(o: ProductOption) -> Self {
        Self { option_id: o.id, kind: o.kind, name: o.name, extra_price: o.extra_price }
    }
}

//--------------------------------------       Audit logs      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderLog {
    pub id: i64,
    pub order_no: OrderNo,
    pub event: String,
    pub operator_type: OperatorType,
    pub operator_id: i64,
    pub operator_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FinanceLog {
    pub id: i64,
    pub store_id: i64,
    pub order_no: OrderNo,
    pub channel: PaymentChannel,
    pub amount: Money,
    pub seq_no: Option<String>,
    pub created_at: DateTime<Utc>,
}
