//! Lease rows backing [`crate::lock::SqliteLockStore`]. Times are milliseconds since the Unix epoch.
use sqlx::SqliteConnection;

use crate::db::sqlite::SqliteDatabaseError;

/// Takes the lease if it is free or expired. Returns true if `token` now holds `key`.
pub async fn try_acquire(
    key: &str,
    token: &str,
    now_ms: i64,
    expires_at_ms: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            INSERT INTO locks (key, token, expires_at) VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET token = excluded.token, expires_at = excluded.expires_at
            WHERE locks.expires_at <= $4
        "#,
    )
    .bind(key)
    .bind(token)
    .bind(expires_at_ms)
    .bind(now_ms)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Deletes the lease only if it is still held by `token`.
pub async fn release(key: &str, token: &str, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query("DELETE FROM locks WHERE key = $1 AND token = $2")
        .bind(key)
        .bind(token)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Pushes the expiry of a lease still held by `token` forward.
pub async fn extend(
    key: &str,
    token: &str,
    now_ms: i64,
    expires_at_ms: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query("UPDATE locks SET expires_at = $1 WHERE key = $2 AND token = $3 AND expires_at > $4")
        .bind(expires_at_ms)
        .bind(key)
        .bind(token)
        .bind(now_ms)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}
