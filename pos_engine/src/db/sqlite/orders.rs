use chrono::Utc;
use log::*;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    api::order_objects::OrderQueryFilter,
    db::sqlite::SqliteDatabaseError,
    db_types::{Order, OrderItem, OrderNo},
};

const ORDER_COLUMNS: &str = "id, order_no, store_id, table_id, status, total_price, discount, real_price, paid, \
                             cash_paid, online_paid, point_paid, wallet_paid, paid_channels, remark, creator_type, \
                             creator_id, creator_name, created_at, updated_at, last_paid_at, finished_at, \
                             cancelled_at, cancel_reason";

/// Inserts the order header and all of its items. The `id` fields of the given order and items are ignored.
/// Returns the order with its database ids filled in.
pub async fn insert_order(mut order: Order, conn: &mut SqliteConnection) -> Result<Order, SqliteDatabaseError> {
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO orders (
                order_no, store_id, table_id, status, total_price, discount, real_price, paid, cash_paid,
                online_paid, point_paid, wallet_paid, paid_channels, remark, creator_type, creator_id,
                creator_name, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING id;
        "#,
    )
    .bind(&order.order_no)
    .bind(order.store_id)
    .bind(order.table_id)
    .bind(order.status)
    .bind(order.total_price)
    .bind(order.discount)
    .bind(order.real_price)
    .bind(order.paid)
    .bind(order.cash_paid)
    .bind(order.online_paid)
    .bind(order.point_paid)
    .bind(order.wallet_paid)
    .bind(&order.paid_channels)
    .bind(&order.remark)
    .bind(order.creator_type)
    .bind(order.creator_id)
    .bind(&order.creator_name)
    .bind(order.created_at)
    .bind(order.updated_at)
    .fetch_one(&mut *conn)
    .await?;
    order.id = id;
    let items = std::mem::take(&mut order.items);
    for item in items {
        let item = insert_item(id, item, conn).await?;
        order.items.push(item);
    }
    debug!("🗃️ Order {} saved with id {id} and {} items", order.order_no, order.items.len());
    Ok(order)
}

pub async fn insert_item(
    order_id: i64,
    mut item: OrderItem,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, SqliteDatabaseError> {
    item.order_id = order_id;
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO order_items (
                order_id, product_id, product_name, spec_id, spec_name, unit_price, options, quantity, amount,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id;
        "#,
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(&item.product_name)
    .bind(item.spec_id)
    .bind(&item.spec_name)
    .bind(item.unit_price)
    .bind(&item.options)
    .bind(item.quantity)
    .bind(item.amount)
    .bind(item.created_at)
    .fetch_one(conn)
    .await?;
    item.id = id;
    Ok(item)
}

/// Writes the price and quantity of an existing item back to the database.
pub async fn update_item(item: &OrderItem, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE order_items SET unit_price = $1, quantity = $2, amount = $3 WHERE id = $4")
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.amount)
        .bind(item.id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn delete_item(item_id: i64, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query("DELETE FROM order_items WHERE id = $1").bind(item_id).execute(conn).await?;
    Ok(())
}

pub async fn fetch_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Fetches the order header and its items. Returns `None` if no such order exists.
pub async fn fetch_order(
    order_no: &OrderNo,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_no = $1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(order_no).fetch_optional(&mut *conn).await?;
    match order {
        Some(mut order) => {
            order.items = fetch_items(order.id, conn).await?;
            Ok(Some(order))
        },
        None => Ok(None),
    }
}

/// Persists every mutable column of the order header. Items are written separately.
pub async fn update_order(order: &mut Order, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    order.updated_at = Utc::now();
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                table_id = $1,
                status = $2,
                total_price = $3,
                discount = $4,
                real_price = $5,
                paid = $6,
                cash_paid = $7,
                online_paid = $8,
                point_paid = $9,
                wallet_paid = $10,
                paid_channels = $11,
                remark = $12,
                updated_at = $13,
                last_paid_at = $14,
                finished_at = $15,
                cancelled_at = $16,
                cancel_reason = $17
            WHERE id = $18
        "#,
    )
    .bind(order.table_id)
    .bind(order.status)
    .bind(order.total_price)
    .bind(order.discount)
    .bind(order.real_price)
    .bind(order.paid)
    .bind(order.cash_paid)
    .bind(order.online_paid)
    .bind(order.point_paid)
    .bind(order.wallet_paid)
    .bind(&order.paid_channels)
    .bind(&order.remark)
    .bind(order.updated_at)
    .bind(order.last_paid_at)
    .bind(order.finished_at)
    .bind(order.cancelled_at)
    .bind(&order.cancel_reason)
    .bind(order.id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::OrderNotFound(order.order_no.to_string()));
    }
    trace!("🗃️ Order {} updated. Status: {}", order.order_no, order.status);
    Ok(())
}

/// Fetches order headers according to the criteria in the `OrderQueryFilter`. Items are not loaded.
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn fetch_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders "));
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(store_id) = query.store_id {
        where_clause.push("store_id = ");
        where_clause.push_bind_unseparated(store_id);
    }
    if let Some(table_id) = query.table_id {
        where_clause.push("table_id = ");
        where_clause.push_bind_unseparated(table_id);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    if !query.statuses.is_empty() {
        let statuses = query.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }

    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of fetch_orders: {}", orders.len());
    Ok(orders)
}
