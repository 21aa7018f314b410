//! # Database traits
//!
//! Read-side behaviour that the order API needs from a storage backend.
//!
//! Writes do not go through these traits. They are free functions over a `&mut SqliteConnection` so that every write
//! inside an operation shares one [`crate::Session`].
mod order_management;
mod product_catalog;

pub use order_management::OrderManagement;
pub use product_catalog::ProductCatalog;
