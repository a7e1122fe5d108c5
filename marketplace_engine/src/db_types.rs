use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
pub use mkt_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------   ProductCategory     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Electronics,
    Clothing,
    Home,
    Office,
    Industrial,
    Food,
    Other,
}

impl Display for ProductCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProductCategory::Electronics => "electronics",
            ProductCategory::Clothing => "clothing",
            ProductCategory::Home => "home",
            ProductCategory::Office => "office",
            ProductCategory::Industrial => "industrial",
            ProductCategory::Food => "food",
            ProductCategory::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for ProductCategory {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "electronics" => Ok(Self::Electronics),
            "clothing" => Ok(Self::Clothing),
            "home" => Ok(Self::Home),
            "office" => Ok(Self::Office),
            "industrial" => Ok(Self::Industrial),
            "food" => Ok(Self::Food),
            "other" => Ok(Self::Other),
            s => Err(ConversionError(format!("Invalid product category: {s}"))),
        }
    }
}

//--------------------------------------       Product         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Cents,
    pub category: ProductCategory,
    pub stock: i64,
    pub image_url: Option<String>,
    /// The user (business) that lists this product
    pub business_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Cents,
    pub category: ProductCategory,
    pub stock: i64,
    pub image_url: Option<String>,
    pub business_id: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price: Cents, stock: i64, business_id: i64) -> Self {
        Self {
            name: name.into(),
            description: String::default(),
            price,
            category: ProductCategory::Other,
            stock,
            image_url: None,
            business_id,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: ProductCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_image_url<S: Into<String>>(mut self, url: S) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

//--------------------------------------         User          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub business_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub business_name: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn new<S1: Into<String>, S2: Into<String>>(email: S1, business_name: S2) -> Self {
        Self { email: email.into(), business_name: business_name.into(), password_hash: String::default() }
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The lifecycle of an order.
///
/// ```text
///   pending ──► processing ──► shipped ──► delivered
///      │            │
///      └────────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order was created, but payment has not been confirmed (alternate payment methods)
    Pending,
    /// Payment is confirmed and the seller is preparing the order
    Processing,
    Shipped,
    Delivered,
    /// The order has been cancelled by the buyer. Terminal.
    Cancelled,
}

impl OrderStatusType {
    /// The position of the status along the forward-only fulfilment path. `Cancelled` is off the path.
    fn rank(&self) -> Option<u8> {
        match self {
            OrderStatusType::Pending => Some(0),
            OrderStatusType::Processing => Some(1),
            OrderStatusType::Shipped => Some(2),
            OrderStatusType::Delivered => Some(3),
            OrderStatusType::Cancelled => None,
        }
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, OrderStatusType::Pending | OrderStatusType::Processing)
    }

    /// True if `next` lies strictly further along the fulfilment path than `self`.
    pub fn can_advance_to(&self, next: OrderStatusType) -> bool {
        match (self.rank(), next.rank()) {
            (Some(a), Some(b)) => b > a,
            _ => false,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Processing => write!(f, "processing"),
            OrderStatusType::Shipped => write!(f, "shipped"),
            OrderStatusType::Delivered => write!(f, "delivered"),
            OrderStatusType::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid through the hosted card checkout. Orders with this method are only created by the reconciler.
    Card,
    Wallet,
    BankTransfer,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Wallet => write!(f, "wallet"),
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "wallet" => Ok(Self::Wallet),
            "bank_transfer" => Ok(Self::BankTransfer),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The public identifier of an order. The integer row id never leaves the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    /// Generates a fresh order id of the form `ORD-3F9A0C1B22D4E5F6`.
    pub fn random() -> Self {
        Self(format!("ORD-{:016X}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   ShippingAddress     ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingAddress {
    #[sqlx(rename = "shipping_full_name")]
    pub full_name: String,
    #[sqlx(rename = "shipping_line1")]
    pub line1: String,
    #[sqlx(rename = "shipping_line2")]
    pub line2: Option<String>,
    #[sqlx(rename = "shipping_city")]
    pub city: String,
    #[sqlx(rename = "shipping_state")]
    pub state: Option<String>,
    #[sqlx(rename = "shipping_postal_code")]
    pub postal_code: String,
    #[sqlx(rename = "shipping_country")]
    pub country: String,
    #[sqlx(rename = "shipping_phone")]
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// Returns the names of the required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}

//--------------------------------------    PaymentDetails     ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// The provider's transaction (payment intent) id
    pub transaction_id: Option<String>,
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
    /// The provider's checkout session id. Together with the user id this is the idempotency key for orders.
    pub session_id: Option<String>,
}

//--------------------------------------      OrderTotals      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Cents,
    pub tax: Cents,
    pub shipping: Cents,
    pub total: Cents,
}

impl OrderTotals {
    pub fn new(subtotal: Cents, tax: Cents, shipping: Cents) -> Self {
        Self { subtotal, tax, shipping, total: subtotal + tax + shipping }
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.subtotal + self.tax + self.shipping
            && !(self.subtotal.is_negative() || self.tax.is_negative() || self.shipping.is_negative())
    }
}

impl Display for OrderTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} + {} tax + {} shipping = {}", self.subtotal, self.tax, self.shipping, self.total)
    }
}

//--------------------------------------       LineItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    /// `None` once the product has been removed from the catalog
    pub product_id: Option<i64>,
    pub name: String,
    /// The catalog price at the time the order was placed
    pub unit_price: Cents,
    pub quantity: i64,
    pub image_url: Option<String>,
}

impl LineItem {
    pub fn amount(&self) -> Cents {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub product_id: Option<i64>,
    pub name: String,
    pub unit_price: Cents,
    pub quantity: i64,
    pub image_url: Option<String>,
}

impl NewLineItem {
    pub fn for_product(product: &Product, quantity: i64) -> Self {
        Self {
            product_id: Some(product.id),
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
            image_url: product.image_url.clone(),
        }
    }

    pub fn amount(&self) -> Cents {
        self.unit_price * self.quantity
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    #[serde(skip)]
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: i64,
    #[sqlx(skip)]
    pub items: Vec<LineItem>,
    #[sqlx(flatten)]
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[sqlx(flatten)]
    pub payment: PaymentDetails,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub status: OrderStatusType,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn with_items(mut self, items: Vec<LineItem>) -> Self {
        self.items = items;
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.payment.session_id.as_deref()
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub user_id: i64,
    pub items: Vec<NewLineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment: PaymentDetails,
    pub totals: OrderTotals,
    pub status: OrderStatusType,
}

impl NewOrder {
    pub fn new(user_id: i64, items: Vec<NewLineItem>, payment_method: PaymentMethod, totals: OrderTotals) -> Self {
        Self {
            order_id: OrderId::random(),
            user_id,
            items,
            shipping_address: ShippingAddress::default(),
            payment_method,
            payment: PaymentDetails::default(),
            totals,
            status: OrderStatusType::Pending,
        }
    }

    pub fn with_shipping_address(mut self, address: ShippingAddress) -> Self {
        self.shipping_address = address;
        self
    }

    pub fn with_payment_details(mut self, payment: PaymentDetails) -> Self {
        self.payment = payment;
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status = status;
        self
    }

    /// The product quantities this order will take out of stock, one entry per line with a product reference.
    pub fn reservations(&self) -> Vec<(i64, i64)> {
        self.items.iter().filter_map(|i| i.product_id.map(|p| (p, i.quantity))).collect()
    }
}
