//! POS Engine
//!
//! The POS Engine is the order fulfilment and payment settlement core of a restaurant point-of-sale platform. It takes
//! an order from creation through item changes, discounts, table moves and one or more payments to a terminal state,
//! and keeps tables, carts and financial records consistent with it.
//!
//! The library is divided into these main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. Repositories work on a
//!    [`Session`], which is the unit of work. The data types used in the database are defined in the [`db_types`]
//!    module and are public.
//! 2. The public API ([`mod@api`]). [`OrderApi`] is the entry point for callers: every mutating operation takes a
//!    keyed lock, opens a transaction, applies the business rules and fires events inside that transaction.
//!    [`PaymentDomainService`] drives payment providers and reconciles their asynchronous callbacks.
//! 3. Events ([`mod@events`]). Audit logs, table occupancy, finance logs and the outbound change stream are all
//!    maintained by handlers subscribed to order and payment events.
//!
//! [`PosEngine`] wires all of the above together from an [`EngineConfig`].
pub mod api;
pub mod config;
pub mod db;
pub mod db_types;
pub mod engine;
pub mod events;
pub mod lock;
pub mod operator;
pub mod providers;
pub mod sequence;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    order_objects,
    payment_objects,
    ErrorKind,
    OrderApi,
    OrderDomainService,
    OrderFlowError,
    OrderRuleError,
    PaymentDomainService,
    PaymentError,
    MAX_ITEM_QUANTITY,
    MAX_UNIT_PRICE,
    ORDER_COMPLETE_LOG,
};
pub use config::EngineConfig;
pub use db::{
    sqlite::{Session, SqliteDatabase, SqliteDatabaseError},
    traits::{OrderManagement, ProductCatalog},
};
pub use engine::{EngineError, PosEngine, PosEngineBuilder};
pub use operator::{Operator, OperatorType};
