use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::Utc;
use hmac::{Hmac, Mac};
use marketplace_engine::{
    db_types::OrderStatusType,
    events::EventProducers,
    helpers::RetryPolicy,
    test_utils::fake_provider::FakePaymentProvider,
    traits::{ProviderPaymentStatus, ProviderSession, StoreError},
    PaymentReconciler,
    PricingPolicy,
};
use serde_json::{json, Value};
use sha2::Sha256;

use super::{
    helpers::{order, send, user},
    mocks::MockStore,
};
use crate::{
    config::{ServerOptions, WebhookOptions},
    routes::{StripeWebhookRoute, STRIPE_SIGNATURE_HEADER},
};

const SIGNING_SECRET: &str = "whsec_endpoint_tests";
const BUYER_ID: i64 = 2;

type Provider = FakePaymentProvider;

fn configure(store: MockStore, provider: Provider) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let reconciler = PaymentReconciler::new(store, provider, PricingPolicy::default(), EventProducers::default())
            .with_retry_policy(RetryPolicy::new(1, Duration::from_millis(1), 1.0));
        cfg.service(StripeWebhookRoute::<MockStore, Provider>::new())
            .app_data(web::Data::new(reconciler))
            .app_data(web::Data::new(ServerOptions::default()))
            .app_data(web::Data::new(WebhookOptions::new(SIGNING_SECRET)));
    }
}

fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

fn event(event_type: &str, session_id: &str) -> String {
    json!({
        "id": "evt_test_0001",
        "type": event_type,
        "data": { "object": { "id": session_id, "object": "checkout.session", "payment_status": "paid" } }
    })
    .to_string()
}

fn delivery(payload: String, signature: Option<String>) -> TestRequest {
    let req = TestRequest::post()
        .uri("/stripe")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payload);
    match signature {
        Some(sig) => req.insert_header((STRIPE_SIGNATURE_HEADER, sig)),
        None => req,
    }
}

fn paid_session(session_id: &str) -> ProviderSession {
    ProviderSession {
        session_id: session_id.to_string(),
        payment_status: ProviderPaymentStatus::Paid,
        amount_subtotal: Default::default(),
        amount_total: Default::default(),
        shipping_cost: Default::default(),
        line_items: vec![],
        payment_handle: None,
        customer_email: None,
        metadata: [("user_id".to_string(), BUYER_ID.to_string())].into_iter().collect(),
    }
}

#[actix_web::test]
async fn unsigned_deliveries_are_rejected() {
    let _ = env_logger::try_init().ok();
    let payload = event("checkout.session.completed", "cs_test_0001");
    let (status, body) = send(delivery(payload, None), configure(MockStore::new(), Provider::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["error"]["code"], "INVALID_SIGNATURE");
}

#[actix_web::test]
async fn deliveries_signed_with_another_secret_are_rejected() {
    let _ = env_logger::try_init().ok();
    let provider = Provider::new();
    let payload = event("checkout.session.completed", "cs_test_0001");
    let signature = sign(&payload, "whsec_someone_else", Utc::now().timestamp());
    let (status, _) = send(delivery(payload, Some(signature)), configure(MockStore::new(), provider.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(provider.retrievals(), 0);
}

#[actix_web::test]
async fn stale_deliveries_are_rejected() {
    let _ = env_logger::try_init().ok();
    let payload = event("checkout.session.completed", "cs_test_0001");
    let signature = sign(&payload, SIGNING_SECRET, Utc::now().timestamp() - 3600);
    let (status, _) = send(delivery(payload, Some(signature)), configure(MockStore::new(), Provider::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn other_events_are_acknowledged_and_ignored() {
    let _ = env_logger::try_init().ok();
    let provider = Provider::new();
    let payload = event("customer.created", "cus_0001");
    let signature = sign(&payload, SIGNING_SECRET, Utc::now().timestamp());
    let (status, body) = send(delivery(payload, Some(signature)), configure(MockStore::new(), provider.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(provider.retrievals(), 0);
}

#[actix_web::test]
async fn completed_session_already_reconciled() {
    let _ = env_logger::try_init().ok();
    let provider = Provider::new();
    provider.insert_session(paid_session("cs_test_0042"));
    let mut store = MockStore::new();
    store.expect_fetch_user_by_id().returning(|id| Ok(Some(user(id, "buyer@example.com"))));
    store
        .expect_fetch_order_by_user_and_session()
        .withf(|user_id, session_id| *user_id == BUYER_ID && session_id == "cs_test_0042")
        .returning(|user_id, _| Ok(Some(order("ord-0042", user_id, OrderStatusType::Processing))));
    store.expect_insert_order().never();
    let payload = event("checkout.session.completed", "cs_test_0042");
    let signature = sign(&payload, SIGNING_SECRET, Utc::now().timestamp());
    let (status, body) = send(delivery(payload, Some(signature)), configure(store, provider.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Order ord-0042 already exists");
    assert_eq!(provider.retrievals(), 1);
}

#[actix_web::test]
async fn unverifiable_sessions_ask_for_a_retry() {
    let _ = env_logger::try_init().ok();
    // The provider has never heard of this session, so verification fails.
    let payload = event("checkout.session.completed", "cs_test_0404");
    let signature = sign(&payload, SIGNING_SECRET, Utc::now().timestamp());
    let (status, body) = send(delivery(payload, Some(signature)), configure(MockStore::new(), Provider::new())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn database_failures_ask_for_a_retry() {
    let _ = env_logger::try_init().ok();
    let provider = Provider::new();
    provider.insert_session(paid_session("cs_test_0042"));
    let mut store = MockStore::new();
    store.expect_fetch_user_by_id().returning(|id| Ok(Some(user(id, "buyer@example.com"))));
    store
        .expect_fetch_order_by_user_and_session()
        .returning(|_, _| Err(StoreError::DatabaseError("database is locked".into())));
    store.expect_insert_order().never();
    let payload = event("checkout.session.completed", "cs_test_0042");
    let signature = sign(&payload, SIGNING_SECRET, Utc::now().timestamp());
    let (status, body) = send(delivery(payload, Some(signature)), configure(store, provider)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn business_outcomes_acknowledge_the_delivery() {
    let _ = env_logger::try_init().ok();
    let provider = Provider::new();
    let mut session = paid_session("cs_test_0042");
    session.payment_status = ProviderPaymentStatus::Unpaid;
    provider.insert_session(session);
    let mut store = MockStore::new();
    store.expect_insert_order().never();
    let payload = event("checkout.session.completed", "cs_test_0042");
    let signature = sign(&payload, SIGNING_SECRET, Utc::now().timestamp());
    let (status, body) = send(delivery(payload, Some(signature)), configure(store, provider)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Payment has not been completed (status: unpaid)");
}
