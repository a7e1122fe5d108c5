//! The marketplace's business operations.
//!
//! Each API object owns a backend (anything implementing the relevant traits from [`crate::traits`]) and, where it
//! needs one, a payment provider. They hold no other state, so building one per request is cheap.
pub mod errors;
pub mod pricing;

pub mod checkout_api;
pub mod identity_api;
pub mod inventory_api;
pub mod order_lifecycle_api;
pub mod order_objects;
pub mod reconciler_api;
