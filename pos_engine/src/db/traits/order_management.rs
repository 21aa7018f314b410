use crate::{
    api::order_objects::OrderQueryFilter,
    db_types::{DiningTable, FinanceLog, Order, OrderLog, OrderNo, Payment},
};

/// The `OrderManagement` trait defines the behaviour for querying information about orders and the records that hang
/// off them. None of these calls take locks; they read committed state.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    type Error: std::error::Error;

    /// Fetches the order, including its line items.
    async fn fetch_order(&self, order_no: &OrderNo) -> Result<Option<Order>, Self::Error>;

    /// Fetches order headers matching the filter. Line items are not loaded.
    async fn fetch_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, Self::Error>;

    async fn fetch_payments_for_order(&self, order_no: &OrderNo) -> Result<Vec<Payment>, Self::Error>;

    async fn fetch_payment(&self, seq_no: &str) -> Result<Option<Payment>, Self::Error>;

    async fn fetch_order_logs(&self, order_no: &OrderNo) -> Result<Vec<OrderLog>, Self::Error>;

    async fn fetch_finance_logs(&self, order_no: &OrderNo) -> Result<Vec<FinanceLog>, Self::Error>;

    async fn fetch_table(&self, table_id: i64) -> Result<Option<DiningTable>, Self::Error>;
}
