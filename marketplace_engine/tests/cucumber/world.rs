use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use log::*;
use marketplace_engine::{
    db_types::{Order, Product, User},
    traits::SessionHandle,
    events::EventProducers,
    order_objects::ReconciliationResult,
    test_utils::{
        fake_provider::FakePaymentProvider,
        prepare_env::{create_database, random_db_path, run_migrations},
    },
    CheckoutApi,
    CheckoutUrls,
    MarketplaceError,
    OrderLifecycleApi,
    PaymentReconciler,
    PricingPolicy,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct MarketplaceWorld {
    pub system: Option<MarketplaceSystem>,
}

pub struct MarketplaceSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub provider: FakePaymentProvider,
    pub users: HashMap<String, User>,
    pub products: HashMap<String, Product>,
    pub last_session: Option<SessionHandle>,
    pub last_reconciliation: Option<ReconciliationResult>,
    pub concurrent_results: Vec<ReconciliationResult>,
    pub last_order: Option<Order>,
    pub last_error: Option<MarketplaceError>,
}

impl Debug for MarketplaceSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MarketplaceSystem({})", self.db_path)
    }
}

impl MarketplaceWorld {
    pub fn system(&self) -> &MarketplaceSystem {
        self.system.as_ref().expect("Marketplace system not initialised")
    }

    pub fn system_mut(&mut self) -> &mut MarketplaceSystem {
        self.system.as_mut().expect("Marketplace system not initialised")
    }
}

impl MarketplaceSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        Self {
            db_path: url,
            db,
            provider: FakePaymentProvider::new(),
            users: HashMap::new(),
            products: HashMap::new(),
            last_session: None,
            last_reconciliation: None,
            concurrent_results: Vec::new(),
            last_order: None,
            last_error: None,
        }
    }

    pub fn user(&self, email: &str) -> &User {
        self.users.get(email).unwrap_or_else(|| panic!("No user {email} in this scenario"))
    }

    pub fn product(&self, name: &str) -> &Product {
        self.products.get(name).unwrap_or_else(|| panic!("No product {name} in this scenario"))
    }

    pub fn checkout_api(&self) -> CheckoutApi<SqliteDatabase, FakePaymentProvider> {
        let urls = CheckoutUrls::for_base_url("http://localhost:3000");
        CheckoutApi::new(self.db.clone(), self.provider.clone(), PricingPolicy::default(), urls)
    }

    pub fn reconciler(&self) -> PaymentReconciler<SqliteDatabase, FakePaymentProvider> {
        PaymentReconciler::new(self.db.clone(), self.provider.clone(), PricingPolicy::default(), EventProducers::default())
    }

    pub fn lifecycle_api(&self) -> OrderLifecycleApi<SqliteDatabase> {
        OrderLifecycleApi::new(self.db.clone(), EventProducers::default())
    }

    pub fn order(&self) -> &Order {
        self.last_order.as_ref().expect("No order has been created in this scenario")
    }

    /// Stores the outcome of an operation that returns an order.
    pub fn record(&mut self, result: Result<Order, MarketplaceError>) {
        match result {
            Ok(order) => {
                self.last_order = Some(order);
                self.last_error = None;
            },
            Err(e) => {
                debug!("Operation failed: {e}");
                self.last_error = Some(e);
            },
        }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
