use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::{LockError, LockStore};
use crate::db::sqlite::{locks, SqliteDatabaseError};

/// Leases stored in the `locks` table, so that every process sharing the database file coordinates through it.
///
/// Each call takes its own pooled connection. It must therefore never be called while the caller holds an open
/// [`crate::Session`] on a single-connection pool; lock scope always contains transaction scope, so it isn't.
#[derive(Debug, Clone)]
pub struct SqliteLockStore {
    pool: SqlitePool,
}

impl SqliteLockStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl From<SqliteDatabaseError> for LockError {
    fn from(e: SqliteDatabaseError) -> Self {
        LockError::StoreError(e.to_string())
    }
}

impl From<sqlx::Error> for LockError {
    fn from(e: sqlx::Error) -> Self {
        LockError::StoreError(e.to_string())
    }
}

fn expiry_ms(now_ms: i64, ttl: Duration) -> i64 {
    now_ms.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

#[async_trait]
impl LockStore for SqliteLockStore {
    async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut conn = self.pool.acquire().await?;
        let now = Utc::now().timestamp_millis();
        let acquired = locks::try_acquire(key, token, now, expiry_ms(now, ttl), &mut conn).await?;
        Ok(acquired)
    }

    async fn release_if_owner(&self, key: &str, token: &str) -> Result<bool, LockError> {
        let mut conn = self.pool.acquire().await?;
        let released = locks::release(key, token, &mut conn).await?;
        Ok(released)
    }

    async fn extend(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut conn = self.pool.acquire().await?;
        let now = Utc::now().timestamp_millis();
        let extended = locks::extend(key, token, now, expiry_ms(now, ttl), &mut conn).await?;
        Ok(extended)
    }
}
