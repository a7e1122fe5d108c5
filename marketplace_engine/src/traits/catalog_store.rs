use crate::{db_types::Product, traits::StoreError};

/// Read access to the product catalog.
///
/// Prices are always taken from here, never from what a client claims a product costs.
#[allow(async_fn_in_trait)]
pub trait CatalogStore {
    /// Fetches all the products with the given ids in a single query. Unknown ids are silently skipped, so callers
    /// must compare the result against the ids they asked for.
    async fn fetch_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>, StoreError>;

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StoreError>;
}
