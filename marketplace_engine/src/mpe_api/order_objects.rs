use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, PaymentMethod, Product, ShippingAddress};

/// A line of a buyer's cart. Anything else the client sends along (a price, a name) is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: i64,
    pub quantity: i64,
}

impl CartItem {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub shipping_address: ShippingAddress,
}

/// An order placed without going through the hosted card checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectOrderRequest {
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// A cart line joined with the catalog entry it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product: Product,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub order: Order,
    /// True if the order already existed, i.e. this payment confirmation had been seen before
    pub already_processed: bool,
}

impl ReconciliationResult {
    pub fn created(order: Order) -> Self {
        Self { order, already_processed: false }
    }

    pub fn existing(order: Order) -> Self {
        Self { order, already_processed: true }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order.order_id
    }
}
