use std::fmt::Debug;

use log::*;
use serde_json::json;

use crate::{
    db_types::{ShippingAddress, User},
    helpers::{absolute_http_url, flatten_metadata},
    mpe_api::{
        errors::MarketplaceError,
        order_objects::{CartItem, CheckoutRequest, PricedLine},
        pricing::{subtotal, PricingPolicy},
    },
    traits::{CatalogStore, PaymentProvider, ProviderLineItem, ProviderSessionRequest, SessionHandle},
};

/// The provider substitutes this with the real session id when it redirects the buyer back.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Metadata key carrying the buyer's user id on a checkout session
pub const USER_ID_METADATA_KEY: &str = "user_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutUrls {
    pub fn for_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            success_url: format!("{base}/checkout/success?session_id={SESSION_ID_PLACEHOLDER}"),
            cancel_url: format!("{base}/checkout/cancel"),
        }
    }
}

/// Turns a cart into a hosted checkout session.
///
/// Nothing is persisted and no stock is taken here. The order only comes into existence once the payment has been
/// confirmed, see [`crate::PaymentReconciler`].
pub struct CheckoutApi<B, P> {
    db: B,
    provider: P,
    pricing: PricingPolicy,
    urls: CheckoutUrls,
}

impl<B, P> Debug for CheckoutApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi({:?})", self.urls)
    }
}

impl<B, P> CheckoutApi<B, P> {
    pub fn new(db: B, provider: P, pricing: PricingPolicy, urls: CheckoutUrls) -> Self {
        Self { db, provider, pricing, urls }
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }
}

impl<B, P> CheckoutApi<B, P>
where
    B: CatalogStore,
    P: PaymentProvider,
{
    pub async fn create_checkout_session(
        &self,
        user: Option<&User>,
        request: CheckoutRequest,
    ) -> Result<SessionHandle, MarketplaceError> {
        let user = user.ok_or(MarketplaceError::Unauthenticated)?;
        validate_cart(&request.items)?;
        validate_address(&request.shipping_address)?;
        let lines = price_cart(&self.db, &request.items).await?;
        check_stock(&lines)?;
        let line_items = lines
            .iter()
            .map(|l| ProviderLineItem {
                product_id: l.product.id,
                name: l.product.name.clone(),
                description: Some(l.product.description.clone()).filter(|d| !d.trim().is_empty()),
                unit_amount: l.product.price,
                quantity: l.quantity,
                image_url: l.product.image_url.as_deref().and_then(absolute_http_url),
            })
            .collect::<Vec<_>>();
        let subtotal = subtotal(line_items.iter().map(|l| (l.unit_amount, l.quantity)))?;
        let totals = self.pricing.quote(subtotal)?;
        let metadata = flatten_metadata(&json!({
            USER_ID_METADATA_KEY: user.id,
            "shipping": &request.shipping_address,
        }));
        let session_request = ProviderSessionRequest {
            line_items,
            success_url: self.urls.success_url.clone(),
            cancel_url: self.urls.cancel_url.clone(),
            customer_email: Some(user.email.clone()),
            metadata,
            tax: totals.tax,
            shipping: totals.shipping,
        };
        let handle = self.provider.create_session(session_request).await.map_err(|e| {
            warn!("🛒️ Could not create a checkout session for user #{}. {e}", user.id);
            MarketplaceError::PaymentSessionError(e.to_string())
        })?;
        info!("🛒️ Checkout session {} created for user #{}. Quoted {totals}", handle.session_id, user.id);
        Ok(handle)
    }
}

pub(crate) fn validate_cart(items: &[CartItem]) -> Result<(), MarketplaceError> {
    if items.is_empty() {
        return Err(MarketplaceError::InvalidRequest("The cart is empty".into()));
    }
    if let Some(item) = items.iter().find(|i| i.quantity <= 0) {
        return Err(MarketplaceError::InvalidRequest(format!(
            "Quantity for product {} must be positive, got {}",
            item.product_id, item.quantity
        )));
    }
    Ok(())
}

pub(crate) fn validate_address(address: &ShippingAddress) -> Result<(), MarketplaceError> {
    let missing = address.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MarketplaceError::InvalidRequest(format!("Shipping address is missing {}", missing.join(", "))))
    }
}

/// An early stock check against the catalog snapshot. The binding check is the reservation when the order is stored.
pub(crate) fn check_stock(lines: &[PricedLine]) -> Result<(), MarketplaceError> {
    match lines.iter().find(|l| l.product.stock < l.quantity) {
        Some(line) => {
            debug!(
                "🛒️ Product #{} has {} in stock, but {} were requested",
                line.product.id, line.product.stock, line.quantity
            );
            Err(MarketplaceError::OutOfStock {
                product_id: line.product.id,
                requested: line.quantity,
                available: line.product.stock,
            })
        },
        None => Ok(()),
    }
}

/// Joins each cart line with its catalog entry, in cart order. Every referenced product must exist.
pub(crate) async fn price_cart<B: CatalogStore>(db: &B, items: &[CartItem]) -> Result<Vec<PricedLine>, MarketplaceError> {
    let mut ids = items.iter().map(|i| i.product_id).collect::<Vec<_>>();
    ids.sort_unstable();
    ids.dedup();
    let products = db.fetch_products_by_ids(&ids).await?;
    items
        .iter()
        .map(|item| {
            products
                .iter()
                .find(|p| p.id == item.product_id)
                .map(|p| PricedLine { product: p.clone(), quantity: item.quantity })
                .ok_or_else(|| MarketplaceError::InvalidRequest(format!("Product {} does not exist", item.product_id)))
        })
        .collect()
}
