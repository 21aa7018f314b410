use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::db::sqlite::SqliteDatabaseError;

/// Atomically increments and returns the counter for `(prefix, day)`. The first call on a given day returns 1.
pub async fn next_value(prefix: &str, day: NaiveDate, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let value: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO sequences (prefix, day, value) VALUES ($1, $2, 1)
            ON CONFLICT (prefix, day) DO UPDATE SET value = value + 1
            RETURNING value
        "#,
    )
    .bind(prefix)
    .bind(day.format("%Y%m%d").to_string())
    .fetch_one(conn)
    .await?;
    Ok(value)
}
