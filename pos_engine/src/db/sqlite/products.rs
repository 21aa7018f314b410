use pos_common::Money;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{OptionKind, Product, ProductOption, ProductSpec},
};

pub async fn insert_product(
    store_id: i64,
    name: &str,
    price: Money,
    conn: &mut SqliteConnection,
) -> Result<Product, SqliteDatabaseError> {
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (store_id, name, price) VALUES ($1, $2, $3) RETURNING id, store_id, name, price, enabled",
    )
    .bind(store_id)
    .bind(name)
    .bind(price)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn insert_spec(
    product_id: i64,
    name: &str,
    price: Money,
    conn: &mut SqliteConnection,
) -> Result<ProductSpec, SqliteDatabaseError> {
    let spec = sqlx::query_as::<_, ProductSpec>(
        "INSERT INTO product_specs (product_id, name, price) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(product_id)
    .bind(name)
    .bind(price)
    .fetch_one(conn)
    .await?;
    Ok(spec)
}

pub async fn insert_option(
    product_id: i64,
    kind: OptionKind,
    name: &str,
    extra_price: Money,
    conn: &mut SqliteConnection,
) -> Result<ProductOption, SqliteDatabaseError> {
    let option = sqlx::query_as::<_, ProductOption>(
        "INSERT INTO product_options (product_id, kind, name, extra_price) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(product_id)
    .bind(kind)
    .bind(name)
    .bind(extra_price)
    .fetch_one(conn)
    .await?;
    Ok(option)
}

pub async fn set_product_enabled(product_id: i64, enabled: bool, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query("UPDATE products SET enabled = $1 WHERE id = $2")
        .bind(enabled)
        .bind(product_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::ProductNotFound(product_id));
    }
    Ok(())
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, SqliteDatabaseError> {
    let product =
        sqlx::query_as::<_, Product>("SELECT id, store_id, name, price, enabled FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(conn)
            .await?;
    Ok(product)
}

pub async fn fetch_spec(
    product_id: i64,
    spec_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ProductSpec>, SqliteDatabaseError> {
    let spec = sqlx::query_as::<_, ProductSpec>("SELECT * FROM product_specs WHERE id = $1 AND product_id = $2")
        .bind(spec_id)
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(spec)
}

/// Fetches the requested options of a product, in the order they were requested. Unknown ids are an error.
pub async fn fetch_options(
    product_id: i64,
    option_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Vec<ProductOption>, SqliteDatabaseError> {
    if option_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM product_options WHERE product_id = ");
    builder.push_bind(product_id);
    builder.push(" AND id IN (");
    let mut ids = builder.separated(", ");
    for id in option_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");
    let found = builder.build_query_as::<ProductOption>().fetch_all(conn).await?;
    option_ids
        .iter()
        .map(|id| {
            found
                .iter()
                .find(|o| o.id == *id)
                .cloned()
                .ok_or(SqliteDatabaseError::OptionNotFound { product_id, option_id: *id })
        })
        .collect()
}
