use std::fmt::Display;

use pos_common::{Money, Quantity};
use pos_engine::{
    db_types::{Order, Payment},
    order_objects::{ItemRemoval, NewOrderItem},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// An order together with every payment that was started for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendItemsParams {
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveItemsParams {
    pub items: Vec<ItemRemoval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountParams {
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePriceParams {
    pub item_id: i64,
    pub price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnTableParams {
    pub table_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelParams {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashParams {
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosePaymentParams {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartQuantityParams {
    pub quantity: Quantity,
}
