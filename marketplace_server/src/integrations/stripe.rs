//! Adapts the Stripe client in `stripe_tools` to the engine's [`PaymentProvider`] contract.
//!
//! Each catalog line is sent to Stripe with the marketplace product id in its product metadata, so that the product
//! can be recovered from the session later. Tax is not computed by Stripe: it is sent as an extra line tagged with
//! `kind=tax`, and stripped out again when the session is read back.
use std::collections::BTreeMap;

use log::*;
use marketplace_engine::{
    db_types::Cents,
    traits::{
        PaymentHandle,
        PaymentProvider,
        PaymentProviderError,
        ProviderLineItem,
        ProviderPaymentStatus,
        ProviderSession,
        ProviderSessionLine,
        ProviderSessionRequest,
        SessionHandle,
    },
};
use stripe_tools::{
    CheckoutSession,
    CheckoutSessionParams,
    SessionLineItem,
    SessionLineItemParams,
    StripeApi,
    StripeApiError,
};

pub const PRODUCT_ID_METADATA_KEY: &str = "product_id";
pub const LINE_KIND_METADATA_KEY: &str = "kind";
pub const TAX_LINE_KIND: &str = "tax";
const TAX_LINE_NAME: &str = "Sales tax";
const SHIPPING_DISPLAY_NAME: &str = "Standard shipping";

#[derive(Clone)]
pub struct StripeGateway {
    api: StripeApi,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StripeGateway({})", self.api.config().api_url)
    }
}

impl StripeGateway {
    pub fn new(api: StripeApi) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &StripeApi {
        &self.api
    }

    fn session_params(&self, request: ProviderSessionRequest) -> CheckoutSessionParams {
        let ProviderSessionRequest { line_items, success_url, cancel_url, customer_email, metadata, tax, shipping } =
            request;
        let mut items = line_items.into_iter().map(product_line).collect::<Vec<_>>();
        if tax.value() > 0 {
            let mut tax_meta = BTreeMap::new();
            tax_meta.insert(LINE_KIND_METADATA_KEY.to_string(), TAX_LINE_KIND.to_string());
            items.push(SessionLineItemParams {
                name: TAX_LINE_NAME.to_string(),
                description: None,
                unit_amount: tax.value(),
                quantity: 1,
                image_url: None,
                metadata: tax_meta,
            });
        }
        CheckoutSessionParams {
            currency: self.api.config().currency.clone(),
            line_items: items,
            success_url,
            cancel_url,
            customer_email,
            metadata,
            shipping_amount: Some(shipping.value()).filter(|s| *s > 0),
            shipping_display_name: Some(SHIPPING_DISPLAY_NAME.to_string()),
        }
    }
}

fn product_line(item: ProviderLineItem) -> SessionLineItemParams {
    let mut metadata = BTreeMap::new();
    metadata.insert(PRODUCT_ID_METADATA_KEY.to_string(), item.product_id.to_string());
    SessionLineItemParams {
        name: item.name,
        description: item.description,
        unit_amount: item.unit_amount.value(),
        quantity: item.quantity,
        image_url: item.image_url,
        metadata,
    }
}

fn is_tax_line(line: &SessionLineItem) -> bool {
    line.product_metadata(LINE_KIND_METADATA_KEY) == Some(TAX_LINE_KIND)
}

fn session_line(line: &SessionLineItem) -> ProviderSessionLine {
    let quantity = line.quantity.unwrap_or(1).max(1);
    let unit_amount = line.unit_amount().unwrap_or(line.amount_subtotal / quantity);
    let product = line.product();
    let name = product.map(|p| p.name.clone()).or_else(|| line.description.clone()).unwrap_or_default();
    ProviderSessionLine {
        product_id: line.product_metadata(PRODUCT_ID_METADATA_KEY).and_then(|s| s.parse::<i64>().ok()),
        name,
        unit_amount: Cents::from(unit_amount),
        quantity,
        amount_total: Cents::from(line.amount_subtotal),
        image_url: product.and_then(|p| p.images.first().cloned()),
    }
}

fn payment_status(status: &str) -> ProviderPaymentStatus {
    match status {
        "paid" => ProviderPaymentStatus::Paid,
        "no_payment_required" => ProviderPaymentStatus::NoPaymentRequired,
        _ => ProviderPaymentStatus::Unpaid,
    }
}

/// Converts a retrieved Stripe session into the provider-neutral form. The tax line is removed from the line items
/// and from the subtotal, so that `amount_subtotal` is the sum of the product lines only.
pub fn provider_session_from_stripe(session: CheckoutSession) -> Result<ProviderSession, PaymentProviderError> {
    let lines = session
        .line_items
        .as_ref()
        .ok_or_else(|| PaymentProviderError::InvalidResponse(format!("Session {} has no line items", session.id)))?;
    if lines.has_more {
        // An order built from a partial cart would under-reserve stock
        return Err(PaymentProviderError::InvalidResponse(format!(
            "Session {} has more line items than were returned",
            session.id
        )));
    }
    let (tax_lines, product_lines): (Vec<&SessionLineItem>, Vec<&SessionLineItem>) =
        lines.data.iter().partition(|l| is_tax_line(l));
    let tax = tax_lines.iter().map(|l| l.amount_subtotal).sum::<i64>();
    let line_items = product_lines.into_iter().map(session_line).collect::<Vec<_>>();
    let line_total = line_items.iter().map(|l| l.amount_total).sum::<Cents>();
    let amount_subtotal = session.amount_subtotal.map(|s| Cents::from(s - tax)).unwrap_or(line_total);
    let payment_handle = session.payment_intent.as_ref().map(|pi| pi.id().to_string());
    let customer_email = session.email().map(String::from);
    Ok(ProviderSession {
        payment_status: payment_status(&session.payment_status),
        amount_subtotal,
        amount_total: Cents::from(session.amount_total.unwrap_or_default()),
        shipping_cost: Cents::from(session.shipping_cost.as_ref().map(|s| s.amount_total).unwrap_or_default()),
        line_items,
        payment_handle,
        customer_email,
        metadata: session.metadata,
        session_id: session.id,
    })
}

impl From<StripeApiError> for PaymentProviderError {
    fn from(e: StripeApiError) -> Self {
        if e.is_transient() {
            return PaymentProviderError::Unavailable(e.to_string());
        }
        match e {
            StripeApiError::JsonError(s) => PaymentProviderError::InvalidResponse(s),
            e => PaymentProviderError::Rejected(e.to_string()),
        }
    }
}

impl PaymentProvider for StripeGateway {
    async fn create_session(&self, request: ProviderSessionRequest) -> Result<SessionHandle, PaymentProviderError> {
        let params = self.session_params(request);
        let session = self.api.create_checkout_session(&params).await?;
        let redirect_url = session.url.ok_or_else(|| {
            PaymentProviderError::InvalidResponse(format!("Stripe did not return a checkout URL for {}", session.id))
        })?;
        Ok(SessionHandle { session_id: session.id, redirect_url })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<ProviderSession, PaymentProviderError> {
        let session = self.api.retrieve_checkout_session(session_id).await?;
        trace!("💳️ Session {session_id} has payment status '{}'", session.payment_status);
        provider_session_from_stripe(session)
    }

    async fn retrieve_payment_handle(&self, handle_id: &str) -> Result<PaymentHandle, PaymentProviderError> {
        let intent = self.api.retrieve_payment_intent(handle_id).await?;
        let card = intent.card();
        Ok(PaymentHandle {
            card_brand: card.and_then(|c| c.brand.clone()),
            card_last4: card.and_then(|c| c.last4.clone()),
            id: intent.id,
            status: intent.status,
        })
    }
}
