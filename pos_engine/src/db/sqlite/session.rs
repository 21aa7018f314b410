//! The unit of work.
//!
//! A [`Session`] owns exactly one connection from the pool, optionally wrapped in a transaction. Repositories in this
//! module take `&mut SqliteConnection`, so everything executed through `session.conn()` shares the same transaction.
//! Code running inside a session must never reach back into the pool for a second connection: with a single-writer
//! SQLite pool that would wait forever.
//!
//! Work that must only happen once the data is durable (e.g. notifying downstream consumers) is registered with
//! [`Session::after_commit`] and runs after a successful commit. Hooks are discarded on rollback.
use std::{future::Future, pin::Pin};

use log::*;
use sqlx::{pool::PoolConnection, Sqlite, SqliteConnection, Transaction};

use crate::db::sqlite::SqliteDatabaseError;

pub type AfterCommitHook = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

enum Handle {
    Connection(PoolConnection<Sqlite>),
    Transaction(Transaction<'static, Sqlite>),
}

pub struct Session {
    handle: Handle,
    after_commit: Vec<AfterCommitHook>,
}

impl Session {
    pub(crate) fn from_connection(conn: PoolConnection<Sqlite>) -> Self {
        Self { handle: Handle::Connection(conn), after_commit: Vec::new() }
    }

    pub(crate) fn from_transaction(tx: Transaction<'static, Sqlite>) -> Self {
        Self { handle: Handle::Transaction(tx), after_commit: Vec::new() }
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self.handle, Handle::Transaction(_))
    }

    pub fn conn(&mut self) -> &mut SqliteConnection {
        match &mut self.handle {
            Handle::Connection(c) => &mut **c,
            Handle::Transaction(tx) => &mut **tx,
        }
    }

    /// Registers work to run once this session commits. Outside a transaction the hook runs when the session is
    /// committed (i.e. closed) as well.
    pub fn after_commit<F>(&mut self, hook: F)
    where F: Future<Output = ()> + Send + 'static {
        self.after_commit.push(Box::pin(hook));
    }

    pub fn pending_hooks(&self) -> usize {
        self.after_commit.len()
    }

    pub async fn commit(self) -> Result<(), SqliteDatabaseError> {
        let Session { handle, after_commit } = self;
        // The connection goes back to the pool before any hook runs, since hooks may need one.
        match handle {
            Handle::Transaction(tx) => tx.commit().await?,
            Handle::Connection(conn) => drop(conn),
        }
        if !after_commit.is_empty() {
            trace!("🗃️ Running {} after-commit hooks", after_commit.len());
        }
        for hook in after_commit {
            hook.await;
        }
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), SqliteDatabaseError> {
        let Session { handle, after_commit } = self;
        if !after_commit.is_empty() {
            debug!("🗃️ Discarding {} after-commit hooks on rollback", after_commit.len());
        }
        if let Handle::Transaction(tx) = handle {
            tx.rollback().await?;
        }
        Ok(())
    }
}
