use std::time::Duration;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::time::Instant;

use super::{LockError, LockStore};

#[derive(Debug, Clone)]
struct Lease {
    token: String,
    expires_at: Instant,
}

impl Lease {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local leases. Shard locking in `DashMap` makes each operation atomic per key.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    leases: DashMap<String, Lease>,
}

impl MemoryLockStore {
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.leases.iter().filter(|l| l.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let now = Instant::now();
        let lease = Lease { token: token.to_string(), expires_at: now + ttl };
        let acquired = match self.leases.entry(key.to_string()) {
            Entry::Occupied(mut e) => {
                if e.get().is_live(now) {
                    false
                } else {
                    e.insert(lease);
                    true
                }
            },
            Entry::Vacant(e) => {
                e.insert(lease);
                true
            },
        };
        Ok(acquired)
    }

    async fn release_if_owner(&self, key: &str, token: &str) -> Result<bool, LockError> {
        let now = Instant::now();
        let removed = self.leases.remove_if(key, |_, lease| lease.token == token && lease.is_live(now));
        Ok(removed.is_some())
    }

    async fn extend(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let now = Instant::now();
        match self.leases.get_mut(key) {
            Some(mut lease) if lease.token == token && lease.is_live(now) => {
                lease.expires_at = now + ttl;
                Ok(true)
            },
            _ => Ok(false),
        }
    }
}
