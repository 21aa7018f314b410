use crate::{api::order_objects::NewOrderItem, db_types::OrderItem};

/// Read-only access to the product catalog.
#[allow(async_fn_in_trait)]
pub trait ProductCatalog {
    type Error: std::error::Error;

    /// Resolves a requested line into a priced snapshot of the product, its spec and its options as they are right
    /// now. The product must belong to `store_id` and be enabled. The returned item has no database ids yet and its
    /// amount is left at zero for the caller to compute.
    async fn snapshot_item(&self, store_id: i64, item: &NewOrderItem) -> Result<OrderItem, Self::Error>;
}
