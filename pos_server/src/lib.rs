//! # POS server
//! This crate hosts the HTTP boundary of the POS order and payment core. It is responsible for:
//! * Exposing the order operations of [`pos_engine::OrderApi`] to POS terminals and back-office clients.
//! * Accepting payment provider webhooks, verifying their signatures and storing them.
//! * Running the callback worker that reconciles stored notifications with their payments.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information, or run
//! the binary with any argument to print the variables it reads.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/orders` and `/orders/{order_no}/...`: Order creation, changes and payments. The caller identifies itself with
//!   the `X-Operator-Type`, `X-Operator-Id` and `X-Operator-Name` headers.
//! * `/tables/{table_id}/...`: Table carts and checkout.
//! * `/exports/{export_id}`: Orders with their items, one export per id at a time.
//! * `/payments/{seq_no}/close`: Abandons a stuck provider payment.
//! * `/webhook/payments/{provider}`: Provider notifications, signed with HMAC-SHA256.
pub mod callback_worker;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod extractors;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
