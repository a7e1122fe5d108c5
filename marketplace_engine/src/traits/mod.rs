//! # Backend contracts
//!
//! The traits in this module define what a storage backend (or an external collaborator) must provide for the
//! marketplace engine to run on top of it. The API objects in [`crate::mpe_api`] are generic over these traits, so
//! that the SQLite backend can be swapped out, or mocked in tests.
//!
//! * [`CatalogStore`] reads products.
//! * [`InventoryLedger`] atomically reserves and releases product stock.
//! * [`IdentityStore`] looks users up.
//! * [`OrderStore`] persists orders and enforces the `(user, session)` uniqueness that makes reconciliation
//!   idempotent.
//! * [`PaymentProvider`] is the external payment processor.
//!
//! [`MarketplaceDatabase`] bundles the storage traits for backends that implement all of them.
mod catalog_store;
mod identity_store;
mod inventory_ledger;
mod order_store;
mod payment_provider;

pub use catalog_store::CatalogStore;
pub use identity_store::IdentityStore;
pub use inventory_ledger::{InventoryError, InventoryLedger};
pub use order_store::{OrderInsertError, OrderStore, StoreError};
pub use payment_provider::{
    PaymentHandle,
    PaymentProvider,
    PaymentProviderError,
    ProviderLineItem,
    ProviderPaymentStatus,
    ProviderSession,
    ProviderSessionLine,
    ProviderSessionRequest,
    SessionHandle,
};

/// Everything a full storage backend provides.
pub trait MarketplaceDatabase: Clone + CatalogStore + InventoryLedger + IdentityStore + OrderStore {
    /// The URL of the database
    fn url(&self) -> &str;
}
