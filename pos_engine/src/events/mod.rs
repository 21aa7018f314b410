//! # Order and payment events
//!
//! State changes are announced through an [`EventNotifier`] inside the transaction that made them. The handlers in
//! [`handlers`] keep dependent records (audit log, tables, finance log) consistent with the order, and publish a
//! [`StreamRecord`] for downstream consumers once the change has committed.
mod errors;
mod event_types;
pub mod handlers;
mod notifier;
mod stream;

pub use errors::HandlerError;
pub use event_types::*;
pub use notifier::{EventHandler, EventNotifier, HandlerFuture};
pub use stream::{NullStreamPublisher, SqliteStreamPublisher, StreamError, StreamPublisher};

pub type OrderNotifier = EventNotifier<OrderEvent>;
pub type PaymentNotifier = EventNotifier<PaymentEvent>;
