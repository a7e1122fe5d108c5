use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    traits::{InventoryError, OrderInsertError, StoreError},
};

/// Every way a marketplace operation can fail.
///
/// Each variant maps to a stable machine-readable [`code`](MarketplaceError::code) that clients can switch on. The
/// `Display` text is meant for humans and may change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketplaceError {
    #[error("Authentication is required")]
    Unauthenticated,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Insufficient stock for product {product_id}: {available} available, {requested} requested")]
    OutOfStock { product_id: i64, requested: i64, available: i64 },
    #[error("Could not create a payment session: {0}")]
    PaymentSessionError(String),
    #[error("Payment has not been completed (status: {0})")]
    PaymentNotCompleted(String),
    #[error("Could not verify the payment: {0}")]
    PaymentVerificationFailed(String),
    #[error("Already processed: {0}")]
    DuplicateKey(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Order cannot be cancelled once it is {0}")]
    NotCancellable(OrderStatusType),
    #[error("Order {0} has already been cancelled")]
    AlreadyCancelled(OrderId),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl MarketplaceError {
    pub fn code(&self) -> &'static str {
        match self {
            MarketplaceError::Unauthenticated => "UNAUTHENTICATED",
            MarketplaceError::InvalidRequest(_) => "INVALID_REQUEST",
            MarketplaceError::OutOfStock { .. } => "OUT_OF_STOCK",
            MarketplaceError::PaymentSessionError(_) => "PAYMENT_SESSION_ERROR",
            MarketplaceError::PaymentNotCompleted(_) => "PAYMENT_NOT_COMPLETED",
            MarketplaceError::PaymentVerificationFailed(_) => "PAYMENT_VERIFICATION_FAILED",
            MarketplaceError::DuplicateKey(_) => "DUPLICATE_KEY",
            MarketplaceError::Forbidden(_) => "FORBIDDEN",
            MarketplaceError::NotCancellable(_) => "NOT_CANCELLABLE",
            MarketplaceError::AlreadyCancelled(_) => "ALREADY_CANCELLED",
            MarketplaceError::NotFound(_) => "NOT_FOUND",
            MarketplaceError::DatabaseError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn order_not_found(order_id: &OrderId) -> Self {
        MarketplaceError::NotFound(format!("Order {order_id}"))
    }
}

impl From<StoreError> for MarketplaceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateKey(s) => MarketplaceError::DuplicateKey(s),
            StoreError::DatabaseError(s) | StoreError::InvalidRecord(s) => MarketplaceError::DatabaseError(s),
        }
    }
}

impl From<InventoryError> for MarketplaceError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::OutOfStock { product_id, requested, available } => {
                MarketplaceError::OutOfStock { product_id, requested, available }
            },
            InventoryError::ProductNotFound(id) => MarketplaceError::NotFound(format!("Product {id}")),
            InventoryError::InvalidQuantity(q) => {
                MarketplaceError::InvalidRequest(format!("Quantity must be positive, got {q}"))
            },
            InventoryError::DatabaseError(s) => MarketplaceError::DatabaseError(s),
        }
    }
}

impl From<OrderInsertError> for MarketplaceError {
    fn from(e: OrderInsertError) -> Self {
        match e {
            OrderInsertError::Store(e) => e.into(),
            OrderInsertError::Inventory(e) => e.into(),
        }
    }
}
