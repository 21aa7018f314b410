use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{PaymentCallback, ProviderKind},
};

/// Stores an inbound provider notification verbatim and returns its id.
pub async fn insert_callback(
    seq_no: &str,
    provider: ProviderKind,
    payload: &str,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO payment_callbacks (seq_no, provider, payload, created_at) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(seq_no)
    .bind(provider)
    .bind(payload)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Callback #{id} for payment {seq_no} from {provider} stored");
    Ok(id)
}

pub async fn fetch_callback(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentCallback>, SqliteDatabaseError> {
    let callback = sqlx::query_as::<_, PaymentCallback>("SELECT * FROM payment_callbacks WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(callback)
}

/// Deletes the callback row. Returns false if it was already gone.
pub async fn delete_callback(id: i64, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query("DELETE FROM payment_callbacks WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Every stored notification that no job has consumed yet, oldest first.
pub async fn pending_callbacks(conn: &mut SqliteConnection) -> Result<Vec<PaymentCallback>, SqliteDatabaseError> {
    let callbacks = sqlx::query_as::<_, PaymentCallback>("SELECT * FROM payment_callbacks ORDER BY id ASC")
        .fetch_all(conn)
        .await?;
    Ok(callbacks)
}
