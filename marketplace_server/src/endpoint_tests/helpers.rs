use actix_web::{
    http::StatusCode,
    test,
    test::TestRequest,
    web::{self, ServiceConfig},
    App,
};
use chrono::{TimeZone, Utc};
use log::debug;
use marketplace_engine::db_types::{
    Cents,
    LineItem,
    NewOrder,
    Order,
    OrderId,
    OrderStatusType,
    OrderTotals,
    PaymentDetails,
    PaymentMethod,
    Product,
    ProductCategory,
    ShippingAddress,
    User,
};

use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::AuthConfig,
};

// DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new("endpoint-test-secret-0f3a9c7e5b1d2468ace")
}

pub fn issue_token(user_id: i64, email: Option<&str>) -> String {
    let issuer = TokenIssuer::new(&get_auth_config());
    issuer.issue_token(user_id, email.map(String::from), None).expect("Failed to sign token")
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

/// Sends `req` to an app configured by `configure`, with the test token verifier installed, and returns the status
/// and body.
pub async fn send<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().app_data(web::Data::new(TokenVerifier::new(&get_auth_config()))).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

pub fn error_code(body: &str) -> String {
    let value: serde_json::Value = serde_json::from_str(body).expect("Error body is not JSON");
    value["error"]["code"].as_str().expect("No error code in body").to_string()
}

pub fn user(id: i64, email: &str) -> User {
    User {
        id,
        email: email.to_string(),
        business_name: format!("Business #{id}"),
        password_hash: String::default(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
    }
}

pub fn product(id: i64, price: i64, stock: i64, business_id: i64) -> Product {
    Product {
        id,
        name: format!("Product {id}"),
        description: String::default(),
        price: Cents::from(price),
        category: ProductCategory::Other,
        stock,
        image_url: Some(format!("https://cdn.example.com/product-{id}.png")),
        business_id,
        created_at: Utc.with_ymd_and_hms(2024, 1, 12, 9, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 1, 12, 9, 0, 0).unwrap(),
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Ada Lovelace".into(),
        line1: "1 Analytical Way".into(),
        line2: None,
        city: "London".into(),
        state: None,
        postal_code: "N1 9GU".into(),
        country: "GB".into(),
        phone: None,
    }
}

/// An order for two units of product 10 at $25.00.
pub fn order(order_id: &str, user_id: i64, status: OrderStatusType) -> Order {
    let created_at = Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap();
    Order {
        id: 1,
        order_id: OrderId::from(order_id),
        user_id,
        items: vec![LineItem {
            id: 1,
            product_id: Some(10),
            name: "Product 10".into(),
            unit_price: Cents::from(2500),
            quantity: 2,
            image_url: None,
        }],
        shipping_address: address(),
        payment_method: PaymentMethod::Card,
        payment: PaymentDetails { session_id: Some("cs_test_0001".into()), ..Default::default() },
        totals: OrderTotals::new(Cents::from(5000), Cents::from(400), Cents::from(1000)),
        status,
        cancellation_reason: None,
        cancelled_at: None,
        created_at,
        updated_at: created_at,
    }
}

/// What a store would hand back after saving `order`.
pub fn saved(order: NewOrder) -> Order {
    let now = Utc::now();
    let items = order
        .items
        .into_iter()
        .enumerate()
        .map(|(i, item)| LineItem {
            id: i as i64 + 1,
            product_id: item.product_id,
            name: item.name,
            unit_price: item.unit_price,
            quantity: item.quantity,
            image_url: item.image_url,
        })
        .collect();
    Order {
        id: 1,
        order_id: order.order_id,
        user_id: order.user_id,
        items,
        shipping_address: order.shipping_address,
        payment_method: order.payment_method,
        payment: order.payment,
        totals: order.totals,
        status: order.status,
        cancellation_reason: None,
        cancelled_at: None,
        created_at: now,
        updated_at: now,
    }
}
