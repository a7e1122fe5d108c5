use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::Cents;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentProviderError {
    /// The provider answered, and said no. Repeating the call will not help.
    #[error("The payment provider rejected the request: {0}")]
    Rejected(String),
    /// The provider could not be reached, or failed internally. The call may succeed if repeated.
    #[error("The payment provider is unavailable: {0}")]
    Unavailable(String),
    #[error("Unexpected response from the payment provider: {0}")]
    InvalidResponse(String),
}

impl PaymentProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PaymentProviderError::Unavailable(_))
    }
}

/// One line of a hosted checkout session, priced from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLineItem {
    pub product_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub unit_amount: Cents,
    pub quantity: i64,
    /// Only ever an absolute http(s) URL
    pub image_url: Option<String>,
}

impl ProviderLineItem {
    pub fn amount(&self) -> Cents {
        self.unit_amount * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSessionRequest {
    pub line_items: Vec<ProviderLineItem>,
    /// Contains the provider's session-id placeholder, which the provider substitutes on redirect
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    /// Provider metadata is a flat string map
    pub metadata: BTreeMap<String, String>,
    pub tax: Cents,
    pub shipping: Cents,
}

/// What the client needs in order to hand over to the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl std::fmt::Display for ProviderPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderPaymentStatus::Paid => write!(f, "paid"),
            ProviderPaymentStatus::Unpaid => write!(f, "unpaid"),
            ProviderPaymentStatus::NoPaymentRequired => write!(f, "no_payment_required"),
        }
    }
}

/// A line of a retrieved session, as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSessionLine {
    /// Recovered from the metadata attached when the session was created. `None` for lines the marketplace did not
    /// create from a catalog product.
    pub product_id: Option<i64>,
    pub name: String,
    pub unit_amount: Cents,
    pub quantity: i64,
    pub amount_total: Cents,
    pub image_url: Option<String>,
}

/// The authoritative state of a checkout session, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSession {
    pub session_id: String,
    pub payment_status: ProviderPaymentStatus,
    /// Sum of the product lines, before tax and shipping
    pub amount_subtotal: Cents,
    /// The amount actually charged
    pub amount_total: Cents,
    pub shipping_cost: Cents,
    pub line_items: Vec<ProviderSessionLine>,
    /// The provider's id for the underlying payment (e.g. a payment intent)
    pub payment_handle: Option<String>,
    pub customer_email: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl ProviderSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == ProviderPaymentStatus::Paid
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHandle {
    pub id: String,
    pub status: String,
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
}

/// The external payment processor.
#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    async fn create_session(&self, request: ProviderSessionRequest) -> Result<SessionHandle, PaymentProviderError>;

    /// Retrieves the session with its line items and payment handle.
    async fn retrieve_session(&self, session_id: &str) -> Result<ProviderSession, PaymentProviderError>;

    async fn retrieve_payment_handle(&self, handle_id: &str) -> Result<PaymentHandle, PaymentProviderError>;
}
