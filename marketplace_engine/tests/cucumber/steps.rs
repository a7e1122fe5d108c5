use cucumber::{then, when};
use futures_util::future::join_all;
use marketplace_engine::{
    db_types::{Cents, OrderStatusType, PaymentMethod},
    order_objects::{CartItem, CheckoutRequest, DirectOrderRequest},
    test_utils::seed::sample_address,
    traits::{CatalogStore, OrderStore},
};
use serde_json::json;

use crate::cucumber::MarketplaceWorld;

async fn checkout(world: &mut MarketplaceWorld, email: &str, items: Vec<CartItem>) {
    let system = world.system_mut();
    let user = system.user(email).clone();
    let request = CheckoutRequest { items, shipping_address: sample_address() };
    match system.checkout_api().create_checkout_session(Some(&user), request).await {
        Ok(handle) => {
            system.last_session = Some(handle);
            system.last_error = None;
        },
        Err(e) => system.last_error = Some(e),
    }
}

#[when(expr = "{string} checks out {int} of {string}")]
async fn check_out(world: &mut MarketplaceWorld, email: String, quantity: i64, product: String) {
    let product_id = world.system().product(&product).id;
    checkout(world, &email, vec![CartItem::new(product_id, quantity)]).await;
}

#[when(expr = "{string} checks out {int} of {string} claiming a price of {int} cents")]
async fn check_out_with_client_price(
    world: &mut MarketplaceWorld,
    email: String,
    quantity: i64,
    product: String,
    price: i64,
) {
    let product_id = world.system().product(&product).id;
    let item = json!({ "product_id": product_id, "quantity": quantity, "price": price, "name": "Bargain" });
    let item = serde_json::from_value::<CartItem>(item).expect("Cart item did not deserialize");
    checkout(world, &email, vec![item]).await;
}

#[when("the checkout session is paid")]
async fn session_is_paid(world: &mut MarketplaceWorld) {
    let system = world.system();
    let handle = system.last_session.as_ref().expect("No checkout session was created");
    system.provider.pay(&handle.session_id);
}

#[when(expr = "{string} verifies the checkout session")]
async fn verify_session(world: &mut MarketplaceWorld, email: String) {
    let system = world.system_mut();
    let user = system.user(&email).clone();
    let session_id = system.last_session.as_ref().expect("No checkout session was created").session_id.clone();
    match system.reconciler().reconcile(Some(&user), &session_id).await {
        Ok(result) => {
            system.last_order = Some(result.order.clone());
            system.last_reconciliation = Some(result);
            system.last_error = None;
        },
        Err(e) => system.last_error = Some(e),
    }
}

#[when(expr = "{string} verifies the checkout session {int} times at once")]
async fn verify_session_concurrently(world: &mut MarketplaceWorld, email: String, n: usize) {
    let system = world.system_mut();
    let user = system.user(&email).clone();
    let session_id = system.last_session.as_ref().expect("No checkout session was created").session_id.clone();
    let reconciler = system.reconciler();
    let attempts = (0..n).map(|_| reconciler.reconcile(Some(&user), &session_id));
    let results = join_all(attempts).await;
    system.concurrent_results =
        results.into_iter().map(|r| r.expect("Concurrent verification failed")).collect::<Vec<_>>();
    system.last_order = system.concurrent_results.first().map(|r| r.order.clone());
}

#[when(expr = "{string} places a {word} order for {int} of {string}")]
async fn direct_order(world: &mut MarketplaceWorld, email: String, method: String, quantity: i64, product: String) {
    let system = world.system_mut();
    let user = system.user(&email).clone();
    let product_id = system.product(&product).id;
    let payment_method = method.parse::<PaymentMethod>().expect("Unknown payment method");
    let request = DirectOrderRequest {
        items: vec![CartItem::new(product_id, quantity)],
        shipping_address: sample_address(),
        payment_method,
    };
    let result = system.reconciler().create_direct_order(Some(&user), request).await.map(|r| r.order);
    system.record(result);
}

#[when(expr = "{string} cancels the order")]
async fn cancel_order(world: &mut MarketplaceWorld, email: String) {
    let system = world.system_mut();
    let user = system.user(&email).clone();
    let order_id = system.order().order_id.clone();
    let result = system.lifecycle_api().cancel(Some(&user), &order_id, Some("Ordered by mistake".into())).await;
    system.record(result);
}

#[when(expr = "{string} marks the order as {string}")]
async fn advance_order(world: &mut MarketplaceWorld, email: String, status: String) {
    let system = world.system_mut();
    let user = system.user(&email).clone();
    let order_id = system.order().order_id.clone();
    let status = status.parse::<OrderStatusType>().expect("Unknown order status");
    let result = system.lifecycle_api().advance_status(Some(&user), &order_id, status).await;
    system.record(result);
}

#[then("a new order is created")]
async fn new_order_created(world: &mut MarketplaceWorld) {
    let system = world.system();
    assert!(system.last_error.is_none(), "Unexpected error: {:?}", system.last_error);
    let result = system.last_reconciliation.as_ref().expect("Nothing was reconciled");
    assert!(!result.already_processed, "Order {} already existed", result.order_id());
}

#[then("the order was already processed")]
async fn already_processed(world: &mut MarketplaceWorld) {
    let system = world.system();
    assert!(system.last_error.is_none(), "Unexpected error: {:?}", system.last_error);
    let result = system.last_reconciliation.as_ref().expect("Nothing was reconciled");
    assert!(result.already_processed, "Order {} was created again", result.order_id());
}

#[then(expr = "exactly {int} verification(s) created an order")]
async fn concurrent_creations(world: &mut MarketplaceWorld, n: usize) {
    let results = &world.system().concurrent_results;
    let created = results.iter().filter(|r| !r.already_processed).count();
    assert_eq!(created, n);
    let first = &results[0].order.order_id;
    assert!(results.iter().all(|r| &r.order.order_id == first), "Verifications returned different orders");
}

#[then(expr = "the order status is {string}")]
async fn order_status(world: &mut MarketplaceWorld, status: String) {
    let system = world.system();
    let expected = status.parse::<OrderStatusType>().expect("Unknown order status");
    let order = system.db.fetch_order_by_order_id(&system.order().order_id).await.expect("Error fetching order");
    let order = order.expect("Order does not exist");
    assert_eq!(order.status, expected);
}

#[then(expr = "the order totals are {int} subtotal, {int} tax, {int} shipping and {int} total")]
async fn order_totals(world: &mut MarketplaceWorld, subtotal: i64, tax: i64, shipping: i64, total: i64) {
    let totals = world.system().order().totals;
    assert_eq!(totals.subtotal, Cents::from(subtotal), "subtotal");
    assert_eq!(totals.tax, Cents::from(tax), "tax");
    assert_eq!(totals.shipping, Cents::from(shipping), "shipping");
    assert_eq!(totals.total, Cents::from(total), "total");
}

#[then(expr = "the order was paid by {word} card ending in {word}")]
async fn card_details(world: &mut MarketplaceWorld, brand: String, last4: String) {
    let payment = &world.system().order().payment;
    assert_eq!(payment.card_brand.as_deref(), Some(brand.as_str()));
    assert_eq!(payment.card_last4.as_deref(), Some(last4.as_str()));
}

#[then(expr = "{string} has {int} in stock")]
async fn stock_level(world: &mut MarketplaceWorld, product: String, stock: i64) {
    let system = world.system();
    let id = system.product(&product).id;
    let product = system.db.fetch_product(id).await.expect("Error fetching product").expect("Product is gone");
    assert_eq!(product.stock, stock, "Stock level for {} is wrong", product.name);
}

#[then(expr = "{string} has {int} order(s)")]
async fn order_count(world: &mut MarketplaceWorld, email: String, n: usize) {
    let system = world.system();
    let user = system.user(&email).clone();
    let orders = system.lifecycle_api().orders_for_user(Some(&user)).await.expect("Error fetching orders");
    assert_eq!(orders.len(), n);
}

#[then(expr = "the request fails with {string}")]
async fn request_fails(world: &mut MarketplaceWorld, code: String) {
    let error = world.system().last_error.as_ref().expect("The request did not fail");
    assert_eq!(error.code(), code, "Unexpected error: {error}");
}

#[then(expr = "the checkout session charges {int} cents each for {string}")]
async fn session_price(world: &mut MarketplaceWorld, price: i64, product: String) {
    let system = world.system();
    let request = system.provider.requests().pop().expect("No session was requested");
    let line = request.line_items.iter().find(|l| l.name == product).expect("Product is not in the session");
    assert_eq!(line.unit_amount, Cents::from(price));
}

#[then(expr = "the checkout session asks for {int} tax and {int} shipping")]
async fn session_tax_and_shipping(world: &mut MarketplaceWorld, tax: i64, shipping: i64) {
    let request = world.system().provider.requests().pop().expect("No session was requested");
    assert_eq!(request.tax, Cents::from(tax));
    assert_eq!(request.shipping, Cents::from(shipping));
}
