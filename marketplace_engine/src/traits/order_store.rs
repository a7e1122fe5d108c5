use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    traits::InventoryError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("A record with the same unique key already exists: {0}")]
    DuplicateKey(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::DuplicateKey(db_err.message().to_string())
            },
            e => StoreError::DatabaseError(e.to_string()),
        }
    }
}

/// Why an order could not be placed. Either way, nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderInsertError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

impl From<sqlx::Error> for OrderInsertError {
    fn from(e: sqlx::Error) -> Self {
        OrderInsertError::Store(e.into())
    }
}

/// Persistence for orders.
///
/// Orders returned from any of these methods carry their line items.
#[allow(async_fn_in_trait)]
pub trait OrderStore {
    /// Looks up the order created for the given provider session, if any.
    async fn fetch_order_by_user_and_session(
        &self,
        user_id: i64,
        session_id: &str,
    ) -> Result<Option<Order>, StoreError>;

    /// Stores a new order and its line items, and takes stock for every line that references a product, in a single
    /// transaction.
    ///
    /// The order row is written before any stock is touched. If an order for the same `(user_id, session_id)` pair
    /// already exists, the call fails with [`StoreError::DuplicateKey`] and stock is left alone. If any line cannot
    /// be reserved, the [`InventoryError`] is returned and the order is not stored.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderInsertError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// All orders placed by the user, newest first.
    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError>;

    /// Sets the order status to `to`, but only if the status is still `from`. Returns `None` if the order does not
    /// exist or its status changed in the meantime.
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
    ) -> Result<Option<Order>, StoreError>;

    /// Marks the order as cancelled with the given reason and the current time, but only if the status is still
    /// `from`. Returns `None` if the order does not exist or its status changed in the meantime.
    async fn cancel_order(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        reason: &str,
    ) -> Result<Option<Order>, StoreError>;
}
