use mockall::mock;
use marketplace_engine::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, Product, User},
    traits::{
        CatalogStore,
        IdentityStore,
        InventoryError,
        InventoryLedger,
        MarketplaceDatabase,
        OrderInsertError,
        OrderStore,
        StoreError,
    },
};

mock! {
    pub Store {}
    impl Clone for Store {
        fn clone(&self) -> Self;
    }
    impl CatalogStore for Store {
        async fn fetch_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>, StoreError>;
        async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StoreError>;
    }
    impl InventoryLedger for Store {
        async fn reserve(&self, product_id: i64, quantity: i64) -> Result<Product, InventoryError>;
        async fn release(&self, product_id: i64, quantity: i64) -> Result<Product, InventoryError>;
    }
    impl IdentityStore for Store {
        async fn fetch_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
        async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    }
    impl OrderStore for Store {
        async fn fetch_order_by_user_and_session(&self, user_id: i64, session_id: &str) -> Result<Option<Order>, StoreError>;
        async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderInsertError>;
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;
        async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError>;
        async fn update_order_status(&self, order_id: &OrderId, from: OrderStatusType, to: OrderStatusType) -> Result<Option<Order>, StoreError>;
        async fn cancel_order(&self, order_id: &OrderId, from: OrderStatusType, reason: &str) -> Result<Option<Order>, StoreError>;
    }
    impl MarketplaceDatabase for Store {
        fn url(&self) -> &str;
    }
}

/// An identity store that knows exactly one user, by id.
pub fn identity_store(known: User) -> MockStore {
    let mut store = MockStore::new();
    store.expect_fetch_user_by_id().returning(move |id| Ok((id == known.id).then(|| known.clone())));
    store.expect_fetch_user_by_email().returning(|_| Ok(None));
    store
}
