use std::{collections::HashMap, time::Duration};

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use marketplace_engine::{
    db_types::{Cents, OrderStatusType, PaymentMethod},
    events::EventProducers,
    helpers::RetryPolicy,
    test_utils::fake_provider::FakePaymentProvider,
    traits::{ProviderPaymentStatus, ProviderSession, ProviderSessionLine},
    CheckoutApi,
    CheckoutUrls,
    IdentityApi,
    PaymentReconciler,
    PricingPolicy,
};
use serde_json::{json, Value};

use super::{
    helpers::{address, bearer, error_code, issue_token, order, product, saved, send, user},
    mocks::{identity_store, MockStore},
};
use crate::routes::{CreateCheckoutSessionRoute, CreateOrderRoute, VerifyPaymentRoute};

const BUYER_ID: i64 = 2;
const SELLER_ID: i64 = 7;

type Provider = FakePaymentProvider;

/// `catalog` backs the checkout API, `orders` backs the reconciler.
fn configure(catalog: MockStore, orders: MockStore, provider: Provider) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let identity = IdentityApi::new(identity_store(user(BUYER_ID, "buyer@example.com")));
        let urls = CheckoutUrls::for_base_url("https://shop.example.com");
        let checkout = CheckoutApi::new(catalog, provider.clone(), PricingPolicy::default(), urls);
        let reconciler = PaymentReconciler::new(orders, provider, PricingPolicy::default(), EventProducers::default())
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(1), 1.0));
        cfg.service(CreateCheckoutSessionRoute::<MockStore, Provider>::new())
            .service(VerifyPaymentRoute::<MockStore, Provider>::new())
            .service(CreateOrderRoute::<MockStore, Provider>::new())
            .app_data(web::Data::new(identity))
            .app_data(web::Data::new(checkout))
            .app_data(web::Data::new(reconciler));
    }
}

fn catalog(stock: i64) -> MockStore {
    let mut store = MockStore::new();
    store
        .expect_fetch_products_by_ids()
        .returning(move |ids| Ok(ids.iter().map(|id| product(*id, 5000, stock, SELLER_ID)).collect()));
    store
}

fn cart(quantity: i64) -> Value {
    json!({
        "items": [{ "product_id": 10, "quantity": quantity, "price": 1 }],
        "shipping_address": address(),
    })
}

fn paid_session(session_id: &str) -> ProviderSession {
    let metadata = [("user_id", "2"), ("shipping_full_name", "Ada Lovelace"), ("shipping_city", "London")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<HashMap<_, _>>();
    ProviderSession {
        session_id: session_id.to_string(),
        payment_status: ProviderPaymentStatus::Paid,
        amount_subtotal: Cents::from(5000),
        amount_total: Cents::from(6400),
        shipping_cost: Cents::from(1000),
        line_items: vec![ProviderSessionLine {
            product_id: Some(10),
            name: "Product 10".into(),
            unit_amount: Cents::from(2500),
            quantity: 2,
            amount_total: Cents::from(5000),
            image_url: None,
        }],
        payment_handle: Some("pi_test_0099".into()),
        customer_email: Some("buyer@example.com".into()),
        metadata,
    }
}

#[actix_web::test]
async fn checkout_prices_from_the_catalog() {
    let _ = env_logger::try_init().ok();
    let provider = Provider::new();
    let token = issue_token(BUYER_ID, None);
    let req = TestRequest::post().uri("/checkout/session").insert_header(bearer(&token)).set_json(cart(2));
    let (status, body) = send(req, configure(catalog(8), MockStore::new(), provider.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let handle: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(handle["session_id"], "cs_test_0001");
    assert_eq!(handle["redirect_url"], "https://checkout.example.com/pay/cs_test_0001");
    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.line_items[0].unit_amount, Cents::from(5000));
    assert_eq!(request.line_items[0].quantity, 2);
    // $100.00 subtotal: 8% tax and free shipping
    assert_eq!(request.tax, Cents::from(800));
    assert_eq!(request.shipping, Cents::from(0));
    assert_eq!(request.metadata.get("user_id").map(String::as_str), Some("2"));
    assert_eq!(request.customer_email.as_deref(), Some("buyer@example.com"));
    assert!(request.success_url.starts_with("https://shop.example.com/checkout/success?session_id="));
}

#[actix_web::test]
async fn checkout_without_enough_stock() {
    let _ = env_logger::try_init().ok();
    let provider = Provider::new();
    let token = issue_token(BUYER_ID, None);
    let req = TestRequest::post().uri("/checkout/session").insert_header(bearer(&token)).set_json(cart(3));
    let (status, body) = send(req, configure(catalog(2), MockStore::new(), provider.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "OUT_OF_STOCK");
    assert!(provider.requests().is_empty());
}

#[actix_web::test]
async fn checkout_with_an_empty_cart() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(BUYER_ID, None);
    let req = TestRequest::post()
        .uri("/checkout/session")
        .insert_header(bearer(&token))
        .set_json(json!({ "items": [], "shipping_address": address() }));
    let (status, body) = send(req, configure(MockStore::new(), MockStore::new(), Provider::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_REQUEST");
}

#[actix_web::test]
async fn checkout_rejected_by_the_provider() {
    let _ = env_logger::try_init().ok();
    let provider = Provider::new();
    provider.reject_sessions("Your account cannot currently make live charges");
    let token = issue_token(BUYER_ID, None);
    let req = TestRequest::post().uri("/checkout/session").insert_header(bearer(&token)).set_json(cart(1));
    let (status, body) = send(req, configure(catalog(8), MockStore::new(), provider)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(&body), "PAYMENT_SESSION_ERROR");
}

#[actix_web::test]
async fn verify_a_paid_session() {
    let _ = env_logger::try_init().ok();
    let provider = Provider::new();
    provider.insert_session(paid_session("cs_test_0099"));
    let mut orders = MockStore::new();
    orders.expect_fetch_order_by_user_and_session().times(1).returning(|_, _| Ok(None));
    // Stock is taken inside insert_order
    orders.expect_reserve().never();
    orders
        .expect_insert_order()
        .withf(|o| {
            o.user_id == BUYER_ID &&
                o.payment_method == PaymentMethod::Card &&
                o.status == OrderStatusType::Processing &&
                o.totals.total == Cents::from(6400) &&
                o.payment.session_id.as_deref() == Some("cs_test_0099")
        })
        .times(1)
        .returning(|o| Ok(saved(o)));
    let token = issue_token(BUYER_ID, None);
    let req = TestRequest::post()
        .uri("/checkout/verify")
        .insert_header(bearer(&token))
        .set_json(json!({ "session_id": "cs_test_0099" }));
    let (status, body) = send(req, configure(MockStore::new(), orders, provider)).await;
    assert_eq!(status, StatusCode::OK);
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["already_processed"], false);
    assert_eq!(result["order"]["status"], "processing");
    assert_eq!(result["order"]["total"], 6400);
    assert_eq!(result["order"]["tax"], 400);
    assert_eq!(result["order"]["payment"]["card_last4"], "4242");
    assert_eq!(result["order_id"], result["order"]["order_id"]);
}

#[actix_web::test]
async fn verify_a_session_twice() {
    let _ = env_logger::try_init().ok();
    let provider = Provider::new();
    let mut orders = MockStore::new();
    orders
        .expect_fetch_order_by_user_and_session()
        .withf(|user_id, session_id| *user_id == BUYER_ID && session_id == "cs_test_0001")
        .returning(|user_id, _| Ok(Some(order("ord-0001", user_id, OrderStatusType::Processing))));
    orders.expect_reserve().never();
    orders.expect_insert_order().never();
    let token = issue_token(BUYER_ID, None);
    let req = TestRequest::post()
        .uri("/checkout/verify")
        .insert_header(bearer(&token))
        .set_json(json!({ "session_id": "cs_test_0001" }));
    let (status, body) = send(req, configure(MockStore::new(), orders, provider.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["already_processed"], true);
    assert_eq!(result["order_id"], "ord-0001");
    assert_eq!(provider.retrievals(), 0);
}

#[actix_web::test]
async fn verify_an_unpaid_session() {
    let _ = env_logger::try_init().ok();
    let provider = Provider::new();
    let mut session = paid_session("cs_test_0099");
    session.payment_status = ProviderPaymentStatus::Unpaid;
    provider.insert_session(session);
    let mut orders = MockStore::new();
    orders.expect_fetch_order_by_user_and_session().returning(|_, _| Ok(None));
    orders.expect_reserve().never();
    let token = issue_token(BUYER_ID, None);
    let req = TestRequest::post()
        .uri("/checkout/verify")
        .insert_header(bearer(&token))
        .set_json(json!({ "session_id": "cs_test_0099" }));
    let (status, body) = send(req, configure(MockStore::new(), orders, provider)).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(error_code(&body), "PAYMENT_NOT_COMPLETED");
}

#[actix_web::test]
async fn verify_someone_elses_session() {
    let _ = env_logger::try_init().ok();
    let provider = Provider::new();
    let mut session = paid_session("cs_test_0099");
    session.metadata.insert("user_id".into(), "3".into());
    provider.insert_session(session);
    let mut orders = MockStore::new();
    orders.expect_fetch_order_by_user_and_session().returning(|_, _| Ok(None));
    orders.expect_insert_order().never();
    let token = issue_token(BUYER_ID, None);
    let req = TestRequest::post()
        .uri("/checkout/verify")
        .insert_header(bearer(&token))
        .set_json(json!({ "session_id": "cs_test_0099" }));
    let (status, body) = send(req, configure(MockStore::new(), orders, provider)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");
}

#[actix_web::test]
async fn direct_order_by_bank_transfer() {
    let _ = env_logger::try_init().ok();
    let mut orders = catalog(8);
    orders.expect_reserve().never();
    orders
        .expect_insert_order()
        .withf(|o| o.status == OrderStatusType::Pending && o.payment_method == PaymentMethod::BankTransfer)
        .times(1)
        .returning(|o| Ok(saved(o)));
    let token = issue_token(BUYER_ID, None);
    let req = TestRequest::post().uri("/orders").insert_header(bearer(&token)).set_json(json!({
        "items": [{ "product_id": 10, "quantity": 1 }],
        "shipping_address": address(),
        "payment_method": "bank_transfer",
    }));
    let (status, body) = send(req, configure(MockStore::new(), orders, Provider::new())).await;
    assert_eq!(status, StatusCode::CREATED);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_method"], "bank_transfer");
    // $50.00 + 8% tax + $10.00 shipping
    assert_eq!(order["total"], 6400);
}

#[actix_web::test]
async fn direct_order_by_card_is_refused() {
    let _ = env_logger::try_init().ok();
    let mut orders = MockStore::new();
    orders.expect_reserve().never();
    let token = issue_token(BUYER_ID, None);
    let req = TestRequest::post().uri("/orders").insert_header(bearer(&token)).set_json(json!({
        "items": [{ "product_id": 10, "quantity": 1 }],
        "shipping_address": address(),
        "payment_method": "card",
    }));
    let (status, body) = send(req, configure(MockStore::new(), orders, Provider::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_REQUEST");
}

#[actix_web::test]
async fn direct_order_for_an_absurd_quantity() {
    let _ = env_logger::try_init().ok();
    let mut orders = catalog(8);
    orders.expect_insert_order().never();
    let token = issue_token(BUYER_ID, None);
    let req = TestRequest::post().uri("/orders").insert_header(bearer(&token)).set_json(json!({
        "items": [{ "product_id": 10, "quantity": 4_000_000_000_000_000i64 }],
        "shipping_address": address(),
        "payment_method": "bank_transfer",
    }));
    let (status, body) = send(req, configure(MockStore::new(), orders, Provider::new())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "OUT_OF_STOCK");
}

#[actix_web::test]
async fn direct_order_too_large_to_price() {
    let _ = env_logger::try_init().ok();
    let mut orders = catalog(i64::MAX);
    orders.expect_insert_order().never();
    let token = issue_token(BUYER_ID, None);
    let req = TestRequest::post().uri("/orders").insert_header(bearer(&token)).set_json(json!({
        "items": [{ "product_id": 10, "quantity": 4_000_000_000_000_000i64 }],
        "shipping_address": address(),
        "payment_method": "bank_transfer",
    }));
    let (status, body) = send(req, configure(MockStore::new(), orders, Provider::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_REQUEST");
}
