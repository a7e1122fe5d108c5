//! # Marketplace server
//! The HTTP front end of the marketplace order and payment reconciliation engine. It is responsible for:
//! * Authenticating buyers and sellers from their bearer tokens.
//! * Turning carts into hosted Stripe checkout sessions.
//! * Verifying payments (on the buyer's return, or from a Stripe webhook) and creating orders from them exactly once.
//! * Order history, cancellation and fulfilment updates.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/checkout/session` and `/api/checkout/verify`: the hosted checkout flow.
//! * `/api/orders[/{order_id}[/cancel|/status]]`: direct orders, history and the order lifecycle.
//! * `/webhook/stripe`: Stripe webhook deliveries, authenticated by their signature.
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
