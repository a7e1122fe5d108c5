use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    config::StripeConfig,
    data_objects::{CheckoutSession, CheckoutSessionParams, List, PaymentIntent, SessionLineItem},
    FormBuilder,
    StripeApiError,
};

/// Stripe's maximum page size for list endpoints.
const LINE_ITEM_PAGE_SIZE: &str = "100";

const SESSION_EXPANSIONS: [&str; 4] =
    ["line_items", "line_items.data.price.product", "payment_intent", "payment_intent.latest_charge"];

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert("Stripe-Version", HeaderValue::from_static("2024-06-20"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&FormBuilder>,
    ) -> Result<T, StripeApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.form(body.fields());
        }
        let response = req.send().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let text = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
            Err(StripeApiError::QueryError { status, message: extract_error_message(&text) })
        }
    }

    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, StripeApiError> {
        let form = params.to_form();
        debug!("💳️ Creating checkout session with {} line items", params.line_items.len());
        let session = self.rest_query::<CheckoutSession>(Method::POST, "/checkout/sessions", &[], Some(&form)).await?;
        info!("💳️ Created checkout session {}", session.id);
        Ok(session)
    }

    /// Fetches a checkout session with its line items (and their products) and the payment intent (with its latest
    /// charge) expanded.
    pub async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeApiError> {
        check_id(session_id)?;
        let path = format!("/checkout/sessions/{session_id}");
        let params = SESSION_EXPANSIONS.iter().map(|e| ("expand[]", *e)).collect::<Vec<_>>();
        debug!("💳️ Fetching checkout session {session_id}");
        let mut session = self.rest_query::<CheckoutSession>(Method::GET, &path, &params, None).await?;
        if let Some(lines) = session.line_items.as_mut() {
            while lines.has_more {
                let Some(last) = lines.data.last().map(|l| l.id.clone()) else { break };
                let page = self.list_session_line_items(session_id, Some(&last)).await?;
                lines.has_more = page.has_more && !page.data.is_empty();
                lines.data.extend(page.data);
            }
        }
        Ok(session)
    }

    /// One page of a checkout session's line items, with their products expanded.
    pub async fn list_session_line_items(
        &self,
        session_id: &str,
        starting_after: Option<&str>,
    ) -> Result<List<SessionLineItem>, StripeApiError> {
        check_id(session_id)?;
        let path = format!("/checkout/sessions/{session_id}/line_items");
        let mut params = vec![("limit", LINE_ITEM_PAGE_SIZE), ("expand[]", "data.price.product")];
        if let Some(id) = starting_after {
            check_id(id)?;
            params.push(("starting_after", id));
        }
        trace!("💳️ Fetching line items for {session_id} after {}", starting_after.unwrap_or("the start"));
        self.rest_query::<List<SessionLineItem>>(Method::GET, &path, &params, None).await
    }

    pub async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, StripeApiError> {
        check_id(payment_intent_id)?;
        let path = format!("/payment_intents/{payment_intent_id}");
        debug!("💳️ Fetching payment intent {payment_intent_id}");
        self.rest_query::<PaymentIntent>(Method::GET, &path, &[("expand[]", "latest_charge")], None).await
    }
}

/// Stripe ids are only ever alphanumerics and underscores. Anything else must not be spliced into a URL path.
fn check_id(id: &str) -> Result<(), StripeApiError> {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StripeApiError::RestRequestError(format!("Invalid Stripe object id: {id}")))
    }
}

fn extract_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: Option<String>,
    }
    serde_json::from_str::<ErrorBody>(body).ok().and_then(|b| b.error.message).unwrap_or_else(|| body.to_string())
}
