use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::FormBuilder;

//----------------------------------------------   Requests  ----------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionLineItemParams {
    pub name: String,
    pub description: Option<String>,
    /// Price of a single unit, in the smallest currency unit
    pub unit_amount: i64,
    pub quantity: i64,
    pub image_url: Option<String>,
    /// Attached to the ad-hoc product Stripe creates for this line, so that the line can be traced back later.
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutSessionParams {
    pub currency: String,
    pub line_items: Vec<SessionLineItemParams>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub metadata: BTreeMap<String, String>,
    /// A fixed shipping charge. `None` or zero omits the shipping option entirely.
    pub shipping_amount: Option<i64>,
    pub shipping_display_name: Option<String>,
}

impl CheckoutSessionParams {
    pub fn to_form(&self) -> FormBuilder {
        let mut form = FormBuilder::new();
        form.push("mode", "payment")
            .push("success_url", &self.success_url)
            .push("cancel_url", &self.cancel_url)
            .push_opt("customer_email", self.customer_email.as_ref())
            .push_map("metadata", &self.metadata);
        for (i, item) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            form.push(format!("{prefix}[quantity]"), item.quantity)
                .push(format!("{prefix}[price_data][currency]"), &self.currency)
                .push(format!("{prefix}[price_data][unit_amount]"), item.unit_amount)
                .push(format!("{prefix}[price_data][product_data][name]"), &item.name)
                .push_opt(format!("{prefix}[price_data][product_data][description]"), item.description.as_ref())
                .push_opt(format!("{prefix}[price_data][product_data][images][0]"), item.image_url.as_ref())
                .push_map(&format!("{prefix}[price_data][product_data][metadata]"), &item.metadata);
        }
        if let Some(amount) = self.shipping_amount.filter(|a| *a > 0) {
            let prefix = "shipping_options[0][shipping_rate_data]";
            let name = self.shipping_display_name.as_deref().unwrap_or("Shipping");
            form.push(format!("{prefix}[type]"), "fixed_amount")
                .push(format!("{prefix}[display_name]"), name)
                .push(format!("{prefix}[fixed_amount][amount]"), amount)
                .push(format!("{prefix}[fixed_amount][currency]"), &self.currency);
        }
        form
    }
}

//----------------------------------------------   Responses  ----------------------------------------------------

/// A field that Stripe returns as a bare id unless it was requested with `expand[]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T> Expandable<T> {
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(o) => Some(o.as_ref()),
        }
    }
}

impl Expandable<PaymentIntent> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id.as_str(),
            Expandable::Object(pi) => pi.id.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`
    pub payment_status: String,
    pub status: Option<String>,
    pub amount_subtotal: Option<i64>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub shipping_cost: Option<ShippingCost>,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub line_items: Option<List<SessionLineItem>>,
    pub payment_intent: Option<Expandable<PaymentIntent>>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    pub fn email(&self) -> Option<&str> {
        self.customer_email.as_deref().or_else(|| self.customer_details.as_ref().and_then(|d| d.email.as_deref()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingCost {
    pub amount_total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLineItem {
    pub id: String,
    pub description: Option<String>,
    pub quantity: Option<i64>,
    pub amount_subtotal: i64,
    pub amount_total: i64,
    pub price: Option<Price>,
}

impl SessionLineItem {
    pub fn unit_amount(&self) -> Option<i64> {
        self.price.as_ref().and_then(|p| p.unit_amount)
    }

    pub fn product(&self) -> Option<&Product> {
        self.price.as_ref().and_then(|p| p.product.as_ref()).and_then(|p| p.as_object())
    }

    pub fn product_metadata(&self, key: &str) -> Option<&str> {
        self.product().and_then(|p| p.metadata.get(key)).map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub id: String,
    pub unit_amount: Option<i64>,
    pub product: Option<Expandable<Product>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub amount: Option<i64>,
    pub latest_charge: Option<Expandable<Charge>>,
}

impl PaymentIntent {
    pub fn card(&self) -> Option<&CardDetails> {
        self.latest_charge
            .as_ref()
            .and_then(|c| c.as_object())
            .and_then(|c| c.payment_method_details.as_ref())
            .and_then(|d| d.card.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    pub payment_method_details: Option<PaymentMethodDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethodDetails {
    pub card: Option<CardDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDetails {
    pub brand: Option<String>,
    pub last4: Option<String>,
}

//----------------------------------------------   Webhooks  ----------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}
