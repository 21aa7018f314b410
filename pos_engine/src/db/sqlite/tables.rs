use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{DiningTable, OrderNo, TableStatus},
};

pub async fn insert_table(store_id: i64, name: &str, conn: &mut SqliteConnection) -> Result<DiningTable, SqliteDatabaseError> {
    let table = sqlx::query_as::<_, DiningTable>(
        "INSERT INTO dining_tables (store_id, name, status, updated_at) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(store_id)
    .bind(name)
    .bind(TableStatus::Free)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(table)
}

pub async fn fetch_table(table_id: i64, conn: &mut SqliteConnection) -> Result<Option<DiningTable>, SqliteDatabaseError> {
    let table = sqlx::query_as::<_, DiningTable>("SELECT * FROM dining_tables WHERE id = $1")
        .bind(table_id)
        .fetch_optional(conn)
        .await?;
    Ok(table)
}

pub async fn fetch_tables_for_store(
    store_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<DiningTable>, SqliteDatabaseError> {
    let tables = sqlx::query_as::<_, DiningTable>("SELECT * FROM dining_tables WHERE store_id = $1 ORDER BY id ASC")
        .bind(store_id)
        .fetch_all(conn)
        .await?;
    Ok(tables)
}

/// Compare-and-set on the table status. The row is only written when its current status equals `from`, and the
/// return value says whether that was the case. Callers decide what a failed swap means; it is never retried here.
pub async fn update_order_id_and_status_from(
    table_id: i64,
    order_no: Option<&OrderNo>,
    from: TableStatus,
    to: TableStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE dining_tables SET order_no = $1, status = $2, updated_at = $3 WHERE id = $4 AND status = $5",
    )
    .bind(order_no)
    .bind(to)
    .bind(Utc::now())
    .bind(table_id)
    .bind(from)
    .execute(conn)
    .await?;
    let swapped = result.rows_affected() == 1;
    trace!("🗃️ Table {table_id} {from} -> {to}: {}", if swapped { "swapped" } else { "unchanged" });
    Ok(swapped)
}

pub async fn set_table_status(
    table_id: i64,
    status: TableStatus,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query("UPDATE dining_tables SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status)
        .bind(Utc::now())
        .bind(table_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::TableNotFound(table_id));
    }
    Ok(())
}
