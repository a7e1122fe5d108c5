//! # Payment reconciliation
//!
//! The reconciler turns a confirmed payment into exactly one persisted order. It is safe to call any number of times,
//! from any number of concurrent requests, for the same checkout session:
//!
//! 1. If an order for `(user, session)` already exists, it is returned untouched.
//! 2. Otherwise the session is retrieved from the provider, which is the only source trusted for what was paid.
//! 3. The order is inserted and stock for every line is reserved, in one transaction and in that order. The store's
//!    unique `(user, session)` index decides races before any stock is taken, so the loser returns the winner's
//!    order even when the winner bought the last unit.
//!
//! Card orders are created here and nowhere else. Orders for other payment methods go through
//! [`PaymentReconciler::create_direct_order`], which prices them from the catalog instead.
use std::{collections::HashMap, fmt::Debug};

use log::*;

use crate::{
    db_types::{
        Cents,
        NewLineItem,
        NewOrder,
        OrderStatusType,
        OrderTotals,
        PaymentDetails,
        PaymentMethod,
        ShippingAddress,
        User,
    },
    events::{EventProducers, OrderCreatedEvent},
    helpers::{retry_with_backoff, RetryPolicy},
    mpe_api::{
        checkout_api::{check_stock, price_cart, validate_address, validate_cart, USER_ID_METADATA_KEY},
        errors::MarketplaceError,
        order_objects::{DirectOrderRequest, ReconciliationResult},
        pricing::{subtotal, PricingPolicy},
    },
    traits::{
        CatalogStore,
        IdentityStore,
        OrderInsertError,
        OrderStore,
        PaymentHandle,
        PaymentProvider,
        ProviderSession,
        StoreError,
    },
};

pub struct PaymentReconciler<B, P> {
    db: B,
    provider: P,
    pricing: PricingPolicy,
    retry: RetryPolicy,
    producers: EventProducers,
}

impl<B, P> Debug for PaymentReconciler<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentReconciler")
    }
}

impl<B, P> PaymentReconciler<B, P> {
    pub fn new(db: B, provider: P, pricing: PricingPolicy, producers: EventProducers) -> Self {
        Self { db, provider, pricing, retry: RetryPolicy::default(), producers }
    }

    /// Sets the retry policy used for provider lookups.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, P> PaymentReconciler<B, P>
where
    B: OrderStore + CatalogStore + IdentityStore,
    P: PaymentProvider,
{
    /// Verifies the checkout session with the provider and materializes the order for it, at most once.
    pub async fn reconcile(
        &self,
        user: Option<&User>,
        session_id: &str,
    ) -> Result<ReconciliationResult, MarketplaceError> {
        let user = user.ok_or(MarketplaceError::Unauthenticated)?;
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(MarketplaceError::InvalidRequest("A session id is required".into()));
        }
        if let Some(order) = self.db.fetch_order_by_user_and_session(user.id, session_id).await? {
            debug!("🔄️ Session {session_id} was already reconciled into order {}", order.order_id);
            return Ok(ReconciliationResult::existing(order));
        }
        let session = self.fetch_session(session_id).await?;
        if let Some(owner) = session.metadata.get(USER_ID_METADATA_KEY) {
            if owner.trim() != user.id.to_string() {
                warn!("🔄️ User #{} tried to claim session {session_id}, which belongs to user {owner}", user.id);
                return Err(MarketplaceError::Forbidden("This checkout session belongs to another user".into()));
            }
        }
        self.materialize(user.id, session).await
    }

    /// Reconciles a session the provider told us about directly. The buyer is taken from the session metadata.
    pub async fn reconcile_notified_session(&self, session_id: &str) -> Result<ReconciliationResult, MarketplaceError> {
        let session = self.fetch_session(session_id.trim()).await?;
        let user_id = session
            .metadata
            .get(USER_ID_METADATA_KEY)
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                MarketplaceError::InvalidRequest(format!("Session {} does not carry a user id", session.session_id))
            })?;
        let user = self.db.fetch_user_by_id(user_id).await?.ok_or_else(|| {
            MarketplaceError::NotFound(format!("User {user_id} (owner of session {})", session.session_id))
        })?;
        if let Some(order) = self.db.fetch_order_by_user_and_session(user.id, &session.session_id).await? {
            debug!("🔄️ Notified session {} was already reconciled", session.session_id);
            return Ok(ReconciliationResult::existing(order));
        }
        self.materialize(user.id, session).await
    }

    /// Creates an order for a payment method that does not go through the hosted checkout. The order is priced from
    /// the catalog and the pricing policy, and starts out `pending`.
    pub async fn create_direct_order(
        &self,
        user: Option<&User>,
        request: DirectOrderRequest,
    ) -> Result<ReconciliationResult, MarketplaceError> {
        let user = user.ok_or(MarketplaceError::Unauthenticated)?;
        if request.payment_method == PaymentMethod::Card {
            return Err(MarketplaceError::InvalidRequest("Card payments must go through checkout".into()));
        }
        validate_cart(&request.items)?;
        validate_address(&request.shipping_address)?;
        let lines = price_cart(&self.db, &request.items).await?;
        check_stock(&lines)?;
        let items = lines.iter().map(|l| NewLineItem::for_product(&l.product, l.quantity)).collect::<Vec<_>>();
        let subtotal = subtotal(items.iter().map(|i| (i.unit_price, i.quantity)))?;
        let totals = self.pricing.quote(subtotal)?;
        let order = NewOrder::new(user.id, items, request.payment_method, totals)
            .with_shipping_address(request.shipping_address);
        let order = self.db.insert_order(order).await.map_err(|e| {
            warn!("📝️ Could not place direct order for user #{}. {e}", user.id);
            MarketplaceError::from(e)
        })?;
        info!("📝️ Order {} ({}) placed by user #{}. {}", order.order_id, order.payment_method, user.id, totals);
        self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
        Ok(ReconciliationResult::created(order))
    }

    async fn fetch_session(&self, session_id: &str) -> Result<ProviderSession, MarketplaceError> {
        let session = retry_with_backoff(&self.retry, || self.provider.retrieve_session(session_id))
            .await
            .map_err(|e| {
                warn!("🔄️ Could not retrieve checkout session {session_id}. {e}");
                MarketplaceError::PaymentVerificationFailed(e.to_string())
            })?;
        if !session.is_paid() {
            info!("🔄️ Session {session_id} is not paid yet ({})", session.payment_status);
            return Err(MarketplaceError::PaymentNotCompleted(session.payment_status.to_string()));
        }
        Ok(session)
    }

    async fn fetch_payment_handle(&self, session: &ProviderSession) -> PaymentHandle {
        let Some(handle_id) = session.payment_handle.as_deref() else {
            return PaymentHandle::default();
        };
        match retry_with_backoff(&self.retry, || self.provider.retrieve_payment_handle(handle_id)).await {
            Ok(handle) => handle,
            Err(e) => {
                // The payment itself is confirmed, only the card summary is missing.
                warn!("🔄️ Could not retrieve payment {handle_id} for session {}. {e}", session.session_id);
                PaymentHandle { id: handle_id.to_string(), ..Default::default() }
            },
        }
    }

    async fn materialize(&self, user_id: i64, session: ProviderSession) -> Result<ReconciliationResult, MarketplaceError> {
        let session_id = session.session_id.clone();
        let handle = self.fetch_payment_handle(&session).await;
        let payment = PaymentDetails {
            transaction_id: Some(handle.id).filter(|s| !s.is_empty()),
            card_brand: handle.card_brand,
            card_last4: handle.card_last4,
            session_id: Some(session_id.clone()),
        };
        let totals = totals_from_session(&session);
        let items = session
            .line_items
            .iter()
            .map(|l| NewLineItem {
                product_id: l.product_id,
                name: l.name.clone(),
                unit_price: l.unit_amount,
                quantity: l.quantity,
                image_url: l.image_url.clone(),
            })
            .collect::<Vec<_>>();
        let order = NewOrder::new(user_id, items, PaymentMethod::Card, totals)
            .with_shipping_address(shipping_address_from_metadata(&session.metadata))
            .with_payment_details(payment)
            .with_status(OrderStatusType::Processing);
        match self.db.insert_order(order).await {
            Ok(order) => {
                info!("🔄️ Session {session_id} reconciled into order {} for user #{user_id}. {totals}", order.order_id);
                self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
                Ok(ReconciliationResult::created(order))
            },
            Err(OrderInsertError::Store(StoreError::DuplicateKey(_))) => {
                info!("🔄️ Session {session_id} was reconciled concurrently. Returning the existing order");
                let winner = self.db.fetch_order_by_user_and_session(user_id, &session_id).await?.ok_or_else(|| {
                    MarketplaceError::DatabaseError(format!("Order for session {session_id} vanished after a conflict"))
                })?;
                Ok(ReconciliationResult::existing(winner))
            },
            Err(OrderInsertError::Inventory(e)) => {
                error!(
                    "🔄️ Session {session_id} is PAID but stock could not be reserved for user #{user_id}. The payment \
                     must be refunded. {e}"
                );
                Err(e.into())
            },
            Err(OrderInsertError::Store(e)) => {
                error!("🔄️ Could not save the order for paid session {session_id}. {e}");
                Err(e.into())
            },
        }
    }
}

/// Records what the provider actually charged. Tax is whatever is left after subtotal and shipping.
fn totals_from_session(session: &ProviderSession) -> OrderTotals {
    let subtotal = session.amount_subtotal.clamp_non_negative();
    let shipping = session.shipping_cost.clamp_non_negative();
    let total = session.amount_total.clamp_non_negative();
    let tax = total - subtotal - shipping;
    if tax.is_negative() {
        // A discount brought the charge below subtotal + shipping. The charged total stays authoritative.
        warn!("🔄️ Session {} charged {total}, less than {subtotal} + {shipping} shipping", session.session_id);
        let shipping = shipping.min(total);
        return OrderTotals::new(total - shipping, Cents::default(), shipping);
    }
    OrderTotals { subtotal, tax, shipping, total }
}

/// Rebuilds the shipping address from the flattened `shipping_*` session metadata.
fn shipping_address_from_metadata(metadata: &HashMap<String, String>) -> ShippingAddress {
    let get = |field: &str| metadata.get(&format!("shipping_{field}")).map(|s| s.trim().to_string());
    let opt = |field: &str| get(field).filter(|s| !s.is_empty());
    ShippingAddress {
        full_name: get("full_name").unwrap_or_default(),
        line1: get("line1").unwrap_or_default(),
        line2: opt("line2"),
        city: get("city").unwrap_or_default(),
        state: opt("state"),
        postal_code: get("postal_code").unwrap_or_default(),
        country: get("country").unwrap_or_default(),
        phone: opt("phone"),
    }
}
