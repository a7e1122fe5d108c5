//! A small Stripe client.
//!
//! Only the corners of the Stripe API the marketplace needs are covered: creating hosted Checkout Sessions,
//! retrieving them (with line items and the payment intent expanded), retrieving payment intents, and verifying
//! the `Stripe-Signature` header on webhook deliveries.
mod api;
mod config;
mod error;
mod form;
mod webhook;

pub mod data_objects;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{
    CheckoutSession,
    CheckoutSessionParams,
    List,
    PaymentIntent,
    SessionLineItem,
    SessionLineItemParams,
    StripeEvent,
};
pub use error::StripeApiError;
pub use form::FormBuilder;
pub use webhook::{verify_webhook_signature, DEFAULT_SIGNATURE_TOLERANCE_SECS};
