//! Order and payment numbers.
//!
//! Numbers have the form `<prefix><YYYYMMDD><counter>`, where the counter restarts at 1 every (UTC) day and is
//! zero-padded to [`SEQUENCE_WIDTH`] digits. Gaps are possible when the operation that drew a number fails.
use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::{sequences, SqliteDatabaseError},
    db_types::OrderNo,
};

pub const SEQUENCE_WIDTH: usize = 5;
pub const DEFAULT_ORDER_PREFIX: &str = "OD";
pub const DEFAULT_PAYMENT_PREFIX: &str = "PY";

#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    order_prefix: String,
    payment_prefix: String,
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ORDER_PREFIX, DEFAULT_PAYMENT_PREFIX)
    }
}

impl SequenceGenerator {
    pub fn new<S: Into<String>>(order_prefix: S, payment_prefix: S) -> Self {
        Self { order_prefix: order_prefix.into(), payment_prefix: payment_prefix.into() }
    }

    pub async fn next_order_no(&self, conn: &mut SqliteConnection) -> Result<OrderNo, SqliteDatabaseError> {
        let number = next_number(&self.order_prefix, Utc::now().date_naive(), conn).await?;
        Ok(OrderNo(number))
    }

    pub async fn next_payment_seq(&self, conn: &mut SqliteConnection) -> Result<String, SqliteDatabaseError> {
        next_number(&self.payment_prefix, Utc::now().date_naive(), conn).await
    }
}

pub async fn next_number(prefix: &str, day: NaiveDate, conn: &mut SqliteConnection) -> Result<String, SqliteDatabaseError> {
    let value = sequences::next_value(prefix, day, conn).await?;
    Ok(format_number(prefix, day, value))
}

pub fn format_number(prefix: &str, day: NaiveDate, value: i64) -> String {
    format!("{prefix}{}{value:0width$}", day.format("%Y%m%d"), width = SEQUENCE_WIDTH)
}
