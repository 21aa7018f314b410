//! # Keyed distributed locks
//!
//! Every mutation of an order, cart or payment runs inside a named lease so that at most one critical section per
//! business key is in progress at any instant, across every process that shares the same [`LockStore`].
//!
//! A lease expires on its own after [`LockOptions::expiry`]. That is the safety net against crashed holders; it trades
//! strict mutual exclusion for liveness. The relational store remains the source of truth, so the lock store is only a
//! coordination aid.
//!
//! ```ignore
//! let guard = manager.acquire(keys::order(&order_no)).await?;
//! // critical section, including the whole transaction
//! guard.release().await;
//! ```
mod memory;
mod sqlite;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use log::*;
pub use memory::MemoryLockStore;
use rand::Rng;
pub use sqlite::SqliteLockStore;
use thiserror::Error;
use tokio::time::Instant;

use crate::api::ErrorKind;

pub const DEFAULT_LOCK_EXPIRY: Duration = Duration::from_secs(8);
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_millis(1600);
pub const DEFAULT_LOCK_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Error)]
pub enum LockError {
    #[error("The resource {0} is being modified by another operation. Please try again later.")]
    AlreadyTaken(String),
    #[error("Lock {0} is not held by this mutex")]
    NotHeld(String),
    #[error("Lock store error: {0}")]
    StoreError(String),
}

impl LockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LockError::AlreadyTaken(_) => ErrorKind::LockContention,
            LockError::NotHeld(_) | LockError::StoreError(_) => ErrorKind::Internal,
        }
    }
}

/// The backing store for leases. Implementations must make `set_if_absent` and `release_if_owner` atomic.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Takes `key` for `token` if no live lease exists. Returns true on success.
    async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Removes the lease only if `token` still holds it. Returns true if a lease was removed.
    async fn release_if_owner(&self, key: &str, token: &str) -> Result<bool, LockError>;

    /// Extends a live lease held by `token`. Returns false if the lease was lost.
    async fn extend(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError>;
}

#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// How long a lease lives if its holder never releases it.
    pub expiry: Duration,
    /// How long `lock` keeps retrying before giving up with [`LockError::AlreadyTaken`].
    pub wait: Duration,
    /// Base delay between attempts. A random jitter of up to half this value is added.
    pub retry_delay: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self { expiry: DEFAULT_LOCK_EXPIRY, wait: DEFAULT_LOCK_WAIT, retry_delay: DEFAULT_LOCK_RETRY_DELAY }
    }
}

/// Hands out mutexes over a shared [`LockStore`].
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn LockStore>,
    options: LockOptions,
}

impl LockManager {
    pub fn new(store: Arc<dyn LockStore>, options: LockOptions) -> Self {
        Self { store, options }
    }

    /// A manager over a process-local store. Suitable for a single server process and for tests.
    pub fn in_memory(options: LockOptions) -> Self {
        Self::new(Arc::new(MemoryLockStore::default()), options)
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    pub fn new_mutex<S: Into<String>>(&self, key: S) -> KeyedMutex {
        self.new_mutex_with(key, self.options)
    }

    pub fn new_mutex_with<S: Into<String>>(&self, key: S, options: LockOptions) -> KeyedMutex {
        KeyedMutex { key: key.into(), token: new_token(), store: Arc::clone(&self.store), options, held: false }
    }

    /// Locks `key`, waiting up to the configured window, and returns a guard that releases it.
    pub async fn acquire<S: Into<String>>(&self, key: S) -> Result<LockGuard, LockError> {
        let mut mutex = self.new_mutex(key);
        mutex.lock().await?;
        Ok(LockGuard { mutex: Some(mutex) })
    }
}

fn new_token() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A mutex over one key. Each instance carries its own random token, so two mutexes over the same key exclude each
/// other even inside one process.
pub struct KeyedMutex {
    key: String,
    token: String,
    store: Arc<dyn LockStore>,
    options: LockOptions,
    held: bool,
}

impl KeyedMutex {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// A single attempt.
    pub async fn try_lock(&mut self) -> Result<bool, LockError> {
        let acquired = self.store.set_if_absent(&self.key, &self.token, self.options.expiry).await?;
        self.held = acquired;
        Ok(acquired)
    }

    /// Retries until the lease is taken or the wait window has elapsed.
    pub async fn lock(&mut self) -> Result<(), LockError> {
        let deadline = Instant::now() + self.options.wait;
        loop {
            if self.try_lock().await? {
                trace!("🔒️ Lock {} acquired", self.key);
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                debug!("🔒️ Gave up waiting for lock {} after {:?}", self.key, self.options.wait);
                return Err(LockError::AlreadyTaken(self.key.clone()));
            }
            let delay = (self.options.retry_delay + jitter(self.options.retry_delay)).min(deadline - now);
            tokio::time::sleep(delay).await;
        }
    }

    /// Releases the lease if this mutex still holds it. Returns false if it had already expired or been taken over.
    pub async fn unlock(&mut self) -> Result<bool, LockError> {
        if !self.held {
            return Err(LockError::NotHeld(self.key.clone()));
        }
        self.held = false;
        let released = self.store.release_if_owner(&self.key, &self.token).await?;
        if released {
            trace!("🔒️ Lock {} released", self.key);
        } else {
            warn!("🔒️ Lock {} had expired before it was released", self.key);
        }
        Ok(released)
    }

    pub async fn extend(&mut self) -> Result<bool, LockError> {
        if !self.held {
            return Err(LockError::NotHeld(self.key.clone()));
        }
        let extended = self.store.extend(&self.key, &self.token, self.options.expiry).await?;
        self.held = extended;
        Ok(extended)
    }
}

fn jitter(base: Duration) -> Duration {
    let max = (base.as_millis() / 2) as u64;
    if max == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max))
}

/// A held lock. Call [`LockGuard::release`] when the critical section is over. A guard that is dropped while still
/// held releases the lease in a background task.
pub struct LockGuard {
    mutex: Option<KeyedMutex>,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key()).finish()
    }
}

impl LockGuard {
    pub fn key(&self) -> &str {
        self.mutex.as_ref().map(|m| m.key()).unwrap_or_default()
    }

    /// Best-effort release. Failures are logged, never returned.
    pub async fn release(mut self) {
        if let Some(mut mutex) = self.mutex.take() {
            if let Err(e) = mutex.unlock().await {
                warn!("🔒️ Could not release lock {}: {e}", mutex.key);
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(mut mutex) = self.mutex.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = mutex.unlock().await {
                        warn!("🔒️ Could not release dropped lock {}: {e}", mutex.key);
                    }
                });
            },
            Err(_) => warn!("🔒️ Lock {} dropped outside a runtime. It will expire on its own.", mutex.key),
        }
    }
}

/// Lock key builders for the business entities that are serialized.
pub mod keys {
    use crate::db_types::OrderNo;

    pub fn order(order_no: &OrderNo) -> String {
        format!("order:{order_no}")
    }

    pub fn cart(table_id: i64) -> String {
        format!("cart:{table_id}")
    }

    pub fn payment(seq_no: &str) -> String {
        format!("payment:{seq_no}")
    }

    pub fn export(export_id: &str) -> String {
        format!("export:{export_id}")
    }
}
