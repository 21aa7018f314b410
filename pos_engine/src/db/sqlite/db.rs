use std::fmt::Debug;

use chrono::Utc;
use log::*;
use pos_common::Money;
use sqlx::{migrate, SqlitePool};

use super::{new_pool, orders, payments, products, tables, Session, SqliteDatabaseError};
use crate::{
    api::order_objects::{NewOrderItem, OrderQueryFilter},
    db::{
        sqlite::logs,
        traits::{OrderManagement, ProductCatalog},
    },
    db_types::{
        BusinessType,
        DiningTable,
        FinanceLog,
        ItemOption,
        OptionKind,
        Order,
        OrderItem,
        OrderLog,
        OrderNo,
        Payment,
        Product,
        ProductOption,
        ProductSpec,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    /// A session without a transaction. Each statement commits on its own.
    pub async fn session(&self) -> Result<Session, SqliteDatabaseError> {
        let conn = self.pool.acquire().await?;
        Ok(Session::from_connection(conn))
    }

    /// Opens a unit of work. Everything executed through the returned session commits or rolls back together.
    /// Dropping the session without committing rolls back.
    pub async fn begin(&self) -> Result<Session, SqliteDatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(Session::from_transaction(tx))
    }

    pub async fn close(&mut self) -> Result<(), SqliteDatabaseError> {
        self.pool.close().await;
        Ok(())
    }

    //------------------------------------   Catalog maintenance   ---------------------------------------------------
    // Catalog and table administration belongs to other services. These exist so that a fresh database can be seeded.

    pub async fn create_table(&self, store_id: i64, name: &str) -> Result<DiningTable, SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        tables::insert_table(store_id, name, &mut conn).await
    }

    pub async fn create_product(&self, store_id: i64, name: &str, price: Money) -> Result<Product, SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(store_id, name, price, &mut conn).await
    }

    pub async fn create_spec(&self, product_id: i64, name: &str, price: Money) -> Result<ProductSpec, SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_spec(product_id, name, price, &mut conn).await
    }

    pub async fn create_option(
        &self,
        product_id: i64,
        kind: OptionKind,
        name: &str,
        extra_price: Money,
    ) -> Result<ProductOption, SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_option(product_id, kind, name, extra_price, &mut conn).await
    }

    pub async fn set_product_enabled(&self, product_id: i64, enabled: bool) -> Result<(), SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        products::set_product_enabled(product_id, enabled, &mut conn).await
    }

    pub async fn fetch_tables_for_store(&self, store_id: i64) -> Result<Vec<DiningTable>, SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        tables::fetch_tables_for_store(store_id, &mut conn).await
    }

    pub async fn fetch_stream_records(&self, order_no: &OrderNo) -> Result<Vec<(String, String)>, SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        logs::fetch_stream_records(order_no, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn fetch_order(&self, order_no: &OrderNo) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_no, &mut conn).await
    }

    async fn fetch_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders(filter, &mut conn).await
    }

    async fn fetch_payments_for_order(&self, order_no: &OrderNo) -> Result<Vec<Payment>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payments_for_business(BusinessType::Order, order_no.as_str(), &mut conn).await
    }

    async fn fetch_payment(&self, seq_no: &str) -> Result<Option<Payment>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(seq_no, &mut conn).await
    }

    async fn fetch_order_logs(&self, order_no: &OrderNo) -> Result<Vec<OrderLog>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        logs::fetch_order_logs(order_no, &mut conn).await
    }

    async fn fetch_finance_logs(&self, order_no: &OrderNo) -> Result<Vec<FinanceLog>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        logs::fetch_finance_logs(order_no, &mut conn).await
    }

    async fn fetch_table(&self, table_id: i64) -> Result<Option<DiningTable>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        tables::fetch_table(table_id, &mut conn).await
    }
}

impl ProductCatalog for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn snapshot_item(&self, store_id: i64, item: &NewOrderItem) -> Result<OrderItem, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(item.product_id, &mut conn)
            .await?
            .filter(|p| p.store_id == store_id)
            .ok_or(SqliteDatabaseError::ProductNotFound(item.product_id))?;
        if !product.enabled {
            return Err(SqliteDatabaseError::ProductUnavailable(product.id));
        }
        let (unit_price, spec_name) = match item.spec_id {
            Some(spec_id) => {
                let spec = products::fetch_spec(product.id, spec_id, &mut conn)
                    .await?
                    .ok_or(SqliteDatabaseError::SpecNotFound { product_id: product.id, spec_id })?;
                (spec.price, Some(spec.name))
            },
            None => (product.price, None),
        };
        let options = products::fetch_options(product.id, &item.option_ids, &mut conn)
            .await?
            .into_iter()
            .map(ItemOption::from)
            .collect::<Vec<_>>();
        trace!("🗃️ Snapshot of product {} ({}) priced at {unit_price}", product.id, product.name);
        Ok(OrderItem {
            id: 0,
            order_id: 0,
            product_id: product.id,
            product_name: product.name,
            spec_id: item.spec_id,
            spec_name,
            unit_price,
            options: sqlx::types::Json(options),
            quantity: item.quantity,
            amount: Money::ZERO,
            created_at: Utc::now(),
        })
    }
}
