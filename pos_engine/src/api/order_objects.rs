use std::fmt::Display;

use chrono::{DateTime, Utc};
use pos_common::{Money, Quantity};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{CartItem, OrderNo, OrderStatus, PaymentChannel, Payment, ProviderKind},
    operator::Operator,
};

/// A request to open an order at a table (or for take-away when `table_id` is `None`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub store_id: i64,
    pub table_id: Option<i64>,
    pub items: Vec<NewOrderItem>,
    #[serde(default)]
    pub remark: Option<String>,
}

impl NewOrder {
    pub fn new(store_id: i64, table_id: Option<i64>) -> Self {
        Self { store_id, table_id, items: Vec::new(), remark: None }
    }

    pub fn with_item(mut self, item: NewOrderItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_remark<S: Into<String>>(mut self, remark: S) -> Self {
        self.remark = Some(remark.into());
        self
    }
}

/// One requested line. Prices are never taken from the request; they come from the catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    #[serde(default)]
    pub spec_id: Option<i64>,
    #[serde(default)]
    pub option_ids: Vec<i64>,
    pub quantity: Quantity,
}

impl NewOrderItem {
    pub fn new<Q: Into<Quantity>>(product_id: i64, quantity: Q) -> Self {
        Self { product_id, spec_id: None, option_ids: Vec::new(), quantity: quantity.into() }
    }

    pub fn with_spec(mut self, spec_id: i64) -> Self {
        self.spec_id = Some(spec_id);
        self
    }

    pub fn with_options(mut self, option_ids: Vec<i64>) -> Self {
        self.option_ids = option_ids;
        self
    }
}

impl From<&CartItem> for NewOrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            spec_id: item.spec_id,
            option_ids: item.option_ids.0.clone(),
            quantity: item.quantity,
        }
    }
}

/// Removes `quantity` units of an item, or the whole line when `quantity` is `None` or covers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoval {
    pub item_id: i64,
    #[serde(default)]
    pub quantity: Option<Quantity>,
}

impl ItemRemoval {
    pub fn whole(item_id: i64) -> Self {
        Self { item_id, quantity: None }
    }

    pub fn partial<Q: Into<Quantity>>(item_id: i64, quantity: Q) -> Self {
        Self { item_id, quantity: Some(quantity.into()) }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub store_id: Option<i64>,
    pub table_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub statuses: Vec<OrderStatus>,
    pub limit: Option<i64>,
}

impl OrderQueryFilter {
    pub fn with_store_id(mut self, store_id: i64) -> Self {
        self.store_id = Some(store_id);
        self
    }

    pub fn with_table_id(mut self, table_id: i64) -> Self {
        self.table_id = Some(table_id);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True when the filter has no selection criteria. `limit` does not count.
    pub fn is_empty(&self) -> bool {
        self.store_id.is_none() &&
            self.table_id.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.statuses.is_empty()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters. ")?;
        }
        if let Some(store_id) = self.store_id {
            write!(f, "store_id: {store_id}. ")?;
        }
        if let Some(table_id) = self.table_id {
            write!(f, "table_id: {table_id}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if !self.statuses.is_empty() {
            let statuses = self.statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        if let Some(limit) = self.limit {
            write!(f, "limit {limit}.")?;
        }
        Ok(())
    }
}

/// Everything the `paid` transition needs to apply one payment to an order.
#[derive(Debug, Clone)]
pub struct PaidParams {
    pub order_no: OrderNo,
    pub amount: Money,
    pub channel: PaymentChannel,
    /// The payment sequence number for provider-backed payments.
    pub seq_no: Option<String>,
    pub operator: Operator,
}

impl PaidParams {
    pub fn cash(order_no: OrderNo, amount: Money, operator: Operator) -> Self {
        Self { order_no, amount, channel: PaymentChannel::Cash, seq_no: None, operator }
    }

    pub fn from_payment(payment: &Payment, operator: Operator) -> Self {
        Self {
            order_no: OrderNo::from(payment.business_id.as_str()),
            amount: payment.amount,
            channel: payment.channel,
            seq_no: Some(payment.seq_no.clone()),
            operator,
        }
    }
}

/// A request to settle (part of) an order through a payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlinePayRequest {
    pub provider: ProviderKind,
    pub amount: Money,
    /// The payment code scanned from the customer's device. Required for barcode payments.
    #[serde(default)]
    pub auth_code: Option<String>,
    /// Identifies the member for points and wallet payments.
    #[serde(default)]
    pub member_token: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
