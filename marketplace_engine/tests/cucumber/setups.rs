use cucumber::given;
use marketplace_engine::test_utils::seed::{seed_product, seed_user};

use crate::cucumber::{world::MarketplaceSystem, MarketplaceWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut MarketplaceWorld) {
    let system = MarketplaceSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a seller {string}")]
async fn a_seller(world: &mut MarketplaceWorld, email: String) {
    let system = world.system_mut();
    let user = seed_user(&system.db, &email, "Acme Wholesale").await;
    system.users.insert(email, user);
}

#[given(expr = "a buyer {string}")]
async fn a_buyer(world: &mut MarketplaceWorld, email: String) {
    let system = world.system_mut();
    let user = seed_user(&system.db, &email, "Corner Shop").await;
    system.users.insert(email, user);
}

#[given(expr = "a product {string} priced at {int} cents with {int} in stock sold by {string}")]
async fn a_product(world: &mut MarketplaceWorld, name: String, price: i64, stock: i64, seller: String) {
    let system = world.system_mut();
    let seller_id = system.user(&seller).id;
    let product = seed_product(&system.db, &name, price, stock, seller_id).await;
    system.products.insert(name, product);
}
