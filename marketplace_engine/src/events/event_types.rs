use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType};

/// Published once an order has been persisted, whichever path created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
    pub previous_status: OrderStatusType,
    /// False if at least one line could not be put back into stock
    pub stock_restored: bool,
}

impl OrderCancelledEvent {
    pub fn new(order: Order, previous_status: OrderStatusType, stock_restored: bool) -> Self {
        Self { order, previous_status, stock_restored }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType) -> Self {
        Self { order, old_status }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    OrderCancelled(OrderCancelledEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
}
