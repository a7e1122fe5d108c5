use log::*;
use mkt_common::{Secret, DEFAULT_CURRENCY_CODE};

pub const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    /// Base URL of the REST API. Overridable so that tests and local mocks can stand in for Stripe.
    pub api_url: String,
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub currency: String,
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("MKT_STRIPE_API_URL").unwrap_or_else(|_| DEFAULT_STRIPE_API_URL.to_string());
        let secret_key = Secret::new(std::env::var("MKT_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ MKT_STRIPE_SECRET_KEY not set. Calls to Stripe will be rejected.");
            String::default()
        }));
        let webhook_secret = Secret::new(std::env::var("MKT_STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ MKT_STRIPE_WEBHOOK_SECRET not set. The Stripe webhook endpoint will reject all deliveries.");
            String::default()
        }));
        let currency = std::env::var("MKT_CURRENCY").unwrap_or_else(|_| DEFAULT_CURRENCY_CODE.to_string());
        Self { api_url, secret_key, webhook_secret, currency }
    }
}
