use chrono::Utc;
use pos_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{FinanceLog, OrderLog, OrderNo, PaymentChannel},
    operator::Operator,
};

pub async fn insert_order_log(
    order_no: &OrderNo,
    event: &str,
    operator: &Operator,
    content: &str,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO order_logs (order_no, event, operator_type, operator_id, operator_name, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
        "#,
    )
    .bind(order_no)
    .bind(event)
    .bind(operator.operator_type())
    .bind(operator.id())
    .bind(operator.name())
    .bind(content)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn fetch_order_logs(order_no: &OrderNo, conn: &mut SqliteConnection) -> Result<Vec<OrderLog>, SqliteDatabaseError> {
    let logs = sqlx::query_as::<_, OrderLog>("SELECT * FROM order_logs WHERE order_no = $1 ORDER BY id ASC")
        .bind(order_no)
        .fetch_all(conn)
        .await?;
    Ok(logs)
}

pub async fn insert_finance_log(
    store_id: i64,
    order_no: &OrderNo,
    channel: PaymentChannel,
    amount: Money,
    seq_no: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO finance_logs (store_id, order_no, channel, amount, seq_no, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
        "#,
    )
    .bind(store_id)
    .bind(order_no)
    .bind(channel)
    .bind(amount)
    .bind(seq_no)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn fetch_finance_logs(
    order_no: &OrderNo,
    conn: &mut SqliteConnection,
) -> Result<Vec<FinanceLog>, SqliteDatabaseError> {
    let logs = sqlx::query_as::<_, FinanceLog>("SELECT * FROM finance_logs WHERE order_no = $1 ORDER BY id ASC")
        .bind(order_no)
        .fetch_all(conn)
        .await?;
    Ok(logs)
}

pub async fn insert_stream_record(
    event: &str,
    order_no: &OrderNo,
    payload: &str,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO order_stream (event, order_no, payload, created_at) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(event)
    .bind(order_no)
    .bind(payload)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Returns `(event, payload)` pairs for the order in the order they were published.
pub async fn fetch_stream_records(
    order_no: &OrderNo,
    conn: &mut SqliteConnection,
) -> Result<Vec<(String, String)>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT event, payload FROM order_stream WHERE order_no = $1 ORDER BY id ASC",
    )
    .bind(order_no)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
