//! # The order and payment API
//!
//! [`OrderApi`] is what callers use. It orchestrates locks, units of work and events around the two domain services:
//! [`OrderDomainService`], the single writer of an order's paid state, and [`PaymentDomainService`], which talks to
//! payment providers and reconciles their callbacks.
//!
//! Every error type in the engine can be classified with an [`ErrorKind`].
mod errors;
mod order_api;
mod order_domain;
pub mod order_objects;
mod order_rules;
mod payment_domain;
pub mod payment_objects;

pub use errors::{ErrorKind, OrderFlowError, OrderRuleError, PaymentError};
pub use order_api::{OrderApi, ORDER_COMPLETE_LOG};
pub use order_domain::OrderDomainService;
pub use order_rules::{MAX_ITEM_QUANTITY, MAX_UNIT_PRICE};
pub use payment_domain::PaymentDomainService;
