use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{BusinessType, NewPayment, Payment, PaymentState},
};

/// Inserts a new payment attempt in the `Processing` state.
///
/// Sequence numbers are unique, so a second insert with the same `seq_no` is reported as a duplicate rather than a
/// generic driver error.
pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, SqliteDatabaseError> {
    let now = Utc::now();
    let result = sqlx::query_as::<_, Payment>(
        r#"
            INSERT INTO payments (
                seq_no, provider, channel, state, amount, business_type, business_id, mch_id, request, response,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(&payment.seq_no)
    .bind(payment.provider)
    .bind(payment.channel)
    .bind(PaymentState::Processing)
    .bind(payment.amount)
    .bind(payment.business_type)
    .bind(&payment.business_id)
    .bind(&payment.mch_id)
    .bind(&payment.request)
    .bind(&payment.response)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(p) => {
            debug!("🗃️ Payment {} for {} {} saved with id {}", p.seq_no, p.business_type, p.business_id, p.id);
            Ok(p)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(SqliteDatabaseError::DuplicatePayment(payment.seq_no))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_payment(seq_no: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE seq_no = $1")
        .bind(seq_no)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

pub async fn fetch_payments_for_business(
    business_type: BusinessType,
    business_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, SqliteDatabaseError> {
    let payments = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE business_type = $1 AND business_id = $2 ORDER BY id ASC",
    )
    .bind(business_type)
    .bind(business_id)
    .fetch_all(conn)
    .await?;
    Ok(payments)
}

/// True if any payment for the given business entity has not reached a terminal state.
pub async fn has_incomplete_payment(
    business_type: BusinessType,
    business_id: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM payments WHERE business_type = $1 AND business_id = $2 AND finished_at IS NULL",
    )
    .bind(business_type)
    .bind(business_id)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

#[derive(Debug, Clone)]
pub struct PaymentStateUpdate {
    pub state: PaymentState,
    pub callback_payload: Option<String>,
    pub fail_reason: Option<String>,
    pub member_info: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Moves a payment to a new state. Finished payments are never touched: the update is conditional on
/// `finished_at IS NULL`, and `None` is returned when no row qualified. The original `request` and `response` are
/// never rewritten.
pub async fn update_payment_state(
    seq_no: &str,
    update: PaymentStateUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
            UPDATE payments SET
                state = $1,
                callback_payload = COALESCE($2, callback_payload),
                fail_reason = $3,
                member_info = COALESCE($4, member_info),
                finished_at = $5,
                updated_at = $6
            WHERE seq_no = $7 AND finished_at IS NULL
            RETURNING *;
        "#,
    )
    .bind(update.state)
    .bind(update.callback_payload)
    .bind(update.fail_reason)
    .bind(update.member_info)
    .bind(update.finished_at)
    .bind(Utc::now())
    .bind(seq_no)
    .fetch_optional(conn)
    .await?;
    if let Some(p) = &payment {
        debug!("🗃️ Payment {seq_no} is now {}", p.state);
    }
    Ok(payment)
}
