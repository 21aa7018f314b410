use chrono::Utc;
use pos_common::Quantity;
use sqlx::{types::Json, SqliteConnection};

use crate::{db::sqlite::SqliteDatabaseError, db_types::CartItem};

pub async fn fetch_cart(table_id: i64, conn: &mut SqliteConnection) -> Result<Vec<CartItem>, SqliteDatabaseError> {
    let items = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE table_id = $1 ORDER BY id ASC")
        .bind(table_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub async fn insert_cart_item(
    table_id: i64,
    product_id: i64,
    spec_id: Option<i64>,
    option_ids: Vec<i64>,
    quantity: Quantity,
    conn: &mut SqliteConnection,
) -> Result<CartItem, SqliteDatabaseError> {
    let now = Utc::now();
    let item = sqlx::query_as::<_, CartItem>(
        r#"
            INSERT INTO cart_items (table_id, product_id, spec_id, option_ids, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
        "#,
    )
    .bind(table_id)
    .bind(product_id)
    .bind(spec_id)
    .bind(Json(option_ids))
    .bind(quantity)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn update_cart_item_quantity(
    table_id: i64,
    item_id: i64,
    quantity: Quantity,
    conn: &mut SqliteConnection,
) -> Result<CartItem, SqliteDatabaseError> {
    let item = sqlx::query_as::<_, CartItem>(
        "UPDATE cart_items SET quantity = $1, updated_at = $2 WHERE id = $3 AND table_id = $4 RETURNING *",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(item_id)
    .bind(table_id)
    .fetch_optional(conn)
    .await?;
    item.ok_or(SqliteDatabaseError::CartItemNotFound(item_id))
}

pub async fn delete_cart_item(table_id: i64, item_id: i64, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND table_id = $2")
        .bind(item_id)
        .bind(table_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::CartItemNotFound(item_id));
    }
    Ok(())
}

/// Removes every item in the table's cart and returns how many were removed.
pub async fn clear_cart(table_id: i64, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE table_id = $1").bind(table_id).execute(conn).await?;
    Ok(result.rows_affected())
}
