use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Order, OrderId, OrderStatusType, User},
    events::{EventProducers, OrderCancelledEvent, OrderStatusChangedEvent},
    mpe_api::{errors::MarketplaceError, inventory_api::release_all},
    traits::{CatalogStore, InventoryLedger, OrderStore},
};

pub const DEFAULT_CANCELLATION_REASON: &str = "Cancelled by customer";

/// A concurrent writer can move an order between the read and the conditional write. After this many lost races we
/// give up.
const MAX_STATUS_ATTEMPTS: usize = 3;

/// Order history, buyer cancellation and seller fulfilment updates.
pub struct OrderLifecycleApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderLifecycleApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderLifecycleApi")
    }
}

impl<B> OrderLifecycleApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderLifecycleApi<B>
where B: OrderStore + InventoryLedger + CatalogStore
{
    pub async fn orders_for_user(&self, user: Option<&User>) -> Result<Vec<Order>, MarketplaceError> {
        let user = user.ok_or(MarketplaceError::Unauthenticated)?;
        let orders = self.db.fetch_orders_for_user(user.id).await?;
        trace!("📝️ Fetched {} orders for user #{}", orders.len(), user.id);
        Ok(orders)
    }

    /// Fetches one of the user's own orders. Other users' orders are reported as not found.
    pub async fn order_for_user(&self, user: Option<&User>, order_id: &OrderId) -> Result<Order, MarketplaceError> {
        let user = user.ok_or(MarketplaceError::Unauthenticated)?;
        self.db
            .fetch_order_by_order_id(order_id)
            .await?
            .filter(|o| o.user_id == user.id)
            .ok_or_else(|| MarketplaceError::order_not_found(order_id))
    }

    /// Cancels a `pending` or `processing` order on behalf of the buyer who placed it, and puts its items back in
    /// stock.
    ///
    /// The status change is what matters to the buyer, so a line that cannot be restocked (say the product was
    /// deleted in the meantime) is logged and skipped rather than failing the cancellation.
    pub async fn cancel(
        &self,
        user: Option<&User>,
        order_id: &OrderId,
        reason: Option<String>,
    ) -> Result<Order, MarketplaceError> {
        let user = user.ok_or(MarketplaceError::Unauthenticated)?;
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string());
        let mut order = self.fetch_order(order_id).await?;
        if order.user_id != user.id {
            warn!("📝️ User #{} tried to cancel order {order_id}, which belongs to user #{}", user.id, order.user_id);
            return Err(MarketplaceError::Forbidden("You can only cancel your own orders".into()));
        }
        for _ in 0..MAX_STATUS_ATTEMPTS {
            let previous = order.status;
            match previous {
                OrderStatusType::Cancelled => return Err(MarketplaceError::AlreadyCancelled(order_id.clone())),
                s if !s.is_cancellable() => return Err(MarketplaceError::NotCancellable(s)),
                _ => {},
            }
            match self.db.cancel_order(order_id, previous, &reason).await? {
                Some(cancelled) => {
                    let stock_restored = self.restock(&cancelled).await;
                    info!("📝️ Order {order_id} cancelled by user #{} (was {previous}). {reason}", user.id);
                    let event = OrderCancelledEvent::new(cancelled.clone(), previous, stock_restored);
                    self.producers.publish_order_cancelled(event).await;
                    return Ok(cancelled);
                },
                None => {
                    debug!("📝️ Order {order_id} changed status while it was being cancelled. Re-reading it");
                    order = self.fetch_order(order_id).await?;
                },
            }
        }
        Err(MarketplaceError::DatabaseError(format!("Order {order_id} keeps changing status. Try again")))
    }

    /// Moves an order forward along the fulfilment path. Only a seller with at least one product in the order may do
    /// this, and only forwards. Cancellation is the buyer's prerogative and goes through [`Self::cancel`].
    pub async fn advance_status(
        &self,
        seller: Option<&User>,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<Order, MarketplaceError> {
        let seller = seller.ok_or(MarketplaceError::Unauthenticated)?;
        if new_status == OrderStatusType::Cancelled {
            return Err(MarketplaceError::InvalidRequest("Orders are cancelled through the cancel endpoint".into()));
        }
        let order = self.fetch_order(order_id).await?;
        let product_ids = order.items.iter().filter_map(|i| i.product_id).collect::<Vec<_>>();
        let products = self.db.fetch_products_by_ids(&product_ids).await?;
        if !products.iter().any(|p| p.business_id == seller.id) {
            warn!("📝️ User #{} is not a seller on order {order_id} and may not update it", seller.id);
            return Err(MarketplaceError::Forbidden("You do not sell any of the products in this order".into()));
        }
        let old_status = order.status;
        if !old_status.can_advance_to(new_status) {
            return Err(MarketplaceError::InvalidRequest(format!(
                "Order {order_id} cannot move from {old_status} to {new_status}"
            )));
        }
        let updated = self.db.update_order_status(order_id, old_status, new_status).await?.ok_or_else(|| {
            MarketplaceError::InvalidRequest(format!("Order {order_id} changed status concurrently. Try again"))
        })?;
        info!("📝️ Order {order_id} moved from {old_status} to {new_status} by seller #{}", seller.id);
        self.producers.publish_order_status_changed(OrderStatusChangedEvent::new(updated.clone(), old_status)).await;
        Ok(updated)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, MarketplaceError> {
        self.db.fetch_order_by_order_id(order_id).await?.ok_or_else(|| MarketplaceError::order_not_found(order_id))
    }

    /// Returns false if any line could not be released.
    async fn restock(&self, order: &Order) -> bool {
        let lines = order.items.iter().filter_map(|i| i.product_id.map(|p| (p, i.quantity))).collect::<Vec<_>>();
        let failures = release_all(&self.db, &lines).await;
        if !failures.is_empty() {
            warn!("📝️ {} of {} lines of order {} were not restocked", failures.len(), lines.len(), order.order_id);
        }
        failures.is_empty()
    }
}
