//! Multi-line stock operations on top of an [`InventoryLedger`].
//!
//! There is no transaction spanning several products, so a multi-line reservation is a sequence of single-product
//! reservations with compensation: if line `n` fails, lines `0..n` are released before the error is returned.
use log::*;

use crate::{
    db_types::Product,
    traits::{InventoryError, InventoryLedger},
};

pub struct InventoryApi<B> {
    db: B,
}

impl<B> InventoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B: InventoryLedger> InventoryApi<B> {
    pub async fn reserve(&self, product_id: i64, quantity: i64) -> Result<Product, InventoryError> {
        self.db.reserve(product_id, quantity).await
    }

    pub async fn release(&self, product_id: i64, quantity: i64) -> Result<Product, InventoryError> {
        self.db.release(product_id, quantity).await
    }

    pub async fn reserve_all(&self, lines: &[(i64, i64)]) -> Result<Vec<Product>, InventoryError> {
        reserve_all(&self.db, lines).await
    }

    pub async fn release_all(&self, lines: &[(i64, i64)]) -> Vec<(i64, InventoryError)> {
        release_all(&self.db, lines).await
    }
}

/// Reserves every `(product_id, quantity)` line, or none of them.
pub(crate) async fn reserve_all<L: InventoryLedger>(
    ledger: &L,
    lines: &[(i64, i64)],
) -> Result<Vec<Product>, InventoryError> {
    let mut reserved = Vec::with_capacity(lines.len());
    let mut products = Vec::with_capacity(lines.len());
    for &(product_id, quantity) in lines {
        match ledger.reserve(product_id, quantity).await {
            Ok(product) => {
                reserved.push((product_id, quantity));
                products.push(product);
            },
            Err(e) => {
                if !reserved.is_empty() {
                    warn!("📦️ Reservation of product #{product_id} failed ({e}). Rolling back {} lines", reserved.len());
                    let failures = release_all(ledger, &reserved).await;
                    if !failures.is_empty() {
                        error!("📦️ Rollback left {} lines unreleased. Stock levels need manual correction", failures.len());
                    }
                }
                return Err(e);
            },
        }
    }
    Ok(products)
}

/// Releases every line, carrying on past failures. Returns the lines that could not be released.
pub(crate) async fn release_all<L: InventoryLedger>(ledger: &L, lines: &[(i64, i64)]) -> Vec<(i64, InventoryError)> {
    let mut failures = Vec::new();
    for &(product_id, quantity) in lines {
        if let Err(e) = ledger.release(product_id, quantity).await {
            error!("📦️ Could not release {quantity} units of product #{product_id}. {e}");
            failures.push((product_id, e));
        }
    }
    failures
}
