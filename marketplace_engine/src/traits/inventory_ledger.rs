use thiserror::Error;

use crate::db_types::Product;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("Product {product_id} has {available} units in stock, but {requested} were requested")]
    OutOfStock { product_id: i64, requested: i64, available: i64 },
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i64),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        InventoryError::DatabaseError(e.to_string())
    }
}

/// The `InventoryLedger` trait defines the two stock mutations the marketplace performs.
///
/// Implementations must make [`reserve`](InventoryLedger::reserve) a single atomic conditional decrement (decrement
/// iff `stock >= quantity`). A read followed by a write is not acceptable, since two concurrent buyers of the last
/// unit would both succeed.
#[allow(async_fn_in_trait)]
pub trait InventoryLedger {
    /// Takes `quantity` units of the product out of stock and returns the updated product.
    ///
    /// Fails with [`InventoryError::OutOfStock`] if fewer than `quantity` units are available, in which case the
    /// stock level is untouched.
    async fn reserve(&self, product_id: i64, quantity: i64) -> Result<Product, InventoryError>;

    /// Puts `quantity` units back into stock. This only undoes earlier reservations, so it never fails for business
    /// reasons; only a missing product is an error.
    async fn release(&self, product_id: i64, quantity: i64) -> Result<Product, InventoryError>;
}
