//! Downstream notification of committed order changes.
use async_trait::async_trait;
use log::*;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::{db::sqlite::logs, events::StreamRecord};

#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error("The stream consumer has shut down")]
    Closed,
    #[error("Could not publish stream record: {0}")]
    PublishFailed(String),
}

/// Publishes [`StreamRecord`]s to whoever consumes order changes downstream. Publishing happens after commit and is
/// best-effort: errors are logged by the caller and never undo the order change.
#[async_trait]
pub trait StreamPublisher: Send + Sync {
    async fn publish(&self, record: StreamRecord) -> Result<(), StreamError>;
}

/// Appends records to the `order_stream` table, which downstream consumers tail.
#[derive(Debug, Clone)]
pub struct SqliteStreamPublisher {
    pool: SqlitePool,
}

impl SqliteStreamPublisher {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreamPublisher for SqliteStreamPublisher {
    async fn publish(&self, record: StreamRecord) -> Result<(), StreamError> {
        let payload = serde_json::to_string(&record).map_err(|e| StreamError::PublishFailed(e.to_string()))?;
        let mut conn = self.pool.acquire().await.map_err(|e| StreamError::PublishFailed(e.to_string()))?;
        let id = logs::insert_stream_record(&record.event_type, &record.order.order_no, &payload, &mut conn)
            .await
            .map_err(|e| StreamError::PublishFailed(e.to_string()))?;
        trace!("📬️ Stream record #{id} ({}) published for order {}", record.event_type, record.order.order_no);
        Ok(())
    }
}

/// Drops every record. For deployments without downstream consumers.
#[derive(Debug, Clone, Default)]
pub struct NullStreamPublisher;

#[async_trait]
impl StreamPublisher for NullStreamPublisher {
    async fn publish(&self, record: StreamRecord) -> Result<(), StreamError> {
        trace!("📬️ Discarding stream record {} for order {}", record.event_type, record.order.order_no);
        Ok(())
    }
}
