//! Marketplace Engine
//!
//! The order and payment reconciliation core of the B2B marketplace. It turns carts into hosted checkout sessions,
//! turns confirmed payments into orders exactly once, keeps stock levels honest, and manages the order lifecycle after
//! that. It knows nothing about HTTP; `marketplace_server` exposes it.
//!
//! The library is divided into three main sections:
//! 1. Backend contracts ([`mod@traits`]) and the SQLite backend that implements them ([`SqliteDatabase`]). The data
//!    types stored in the database live in [`mod@db_types`] and are public.
//! 2. The public API ([`mod@mpe_api`]). Each API object is generic over the backend traits it needs:
//!    * [`IdentityApi`] maps credentials onto users,
//!    * [`InventoryApi`] reserves and releases stock,
//!    * [`CheckoutApi`] creates provider checkout sessions,
//!    * [`PaymentReconciler`] materializes orders from confirmed payments, idempotently,
//!    * [`OrderLifecycleApi`] handles history, cancellation and fulfilment updates.
//! 3. Events. When an order is created, cancelled or moves along the fulfilment path, an event is published to any
//!    subscribed hooks. See [`mod@events`].
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod mpe_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(all(feature = "sqlite", any(feature = "test_utils", test)))]
pub mod test_utils;

pub use mpe_api::{
    checkout_api::{CheckoutApi, CheckoutUrls},
    errors::MarketplaceError,
    identity_api::{Credential, IdentityApi, ResolutionStrategy},
    inventory_api::InventoryApi,
    order_lifecycle_api::OrderLifecycleApi,
    order_objects,
    pricing::PricingPolicy,
    reconciler_api::PaymentReconciler,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{shared_database, SqliteDatabase};
pub use traits::MarketplaceDatabase;
