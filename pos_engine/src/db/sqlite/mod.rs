pub mod db;
mod errors;
mod session;

pub mod callbacks;
pub mod carts;
pub mod locks;
pub mod logs;
pub mod orders;
pub mod payments;
pub mod products;
pub mod sequences;
pub mod tables;

use std::{str::FromStr, time::Duration};

pub use db::SqliteDatabase;
pub use errors::SqliteDatabaseError;
use log::*;
pub use session::{AfterCommitHook, Session};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

pub const DEFAULT_SQLITE_DB_URL: &str = "sqlite://data/pos.db";

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    debug!("🗃️ Connected to {url} with up to {max_connections} connections");
    Ok(pool)
}
