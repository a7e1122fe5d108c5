use std::fmt::Display;

use marketplace_engine::{
    db_types::{Order, OrderId, OrderStatusType},
    order_objects::ReconciliationResult,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySessionParams {
    pub session_id: String,
}

/// The answer to a payment verification. `already_processed` is true when the session had been reconciled before,
/// in which case `order` is the order created the first time round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub order_id: OrderId,
    pub already_processed: bool,
    pub order: Order,
}

impl From<ReconciliationResult> for VerifyResponse {
    fn from(result: ReconciliationResult) -> Self {
        Self { order_id: result.order.order_id.clone(), already_processed: result.already_processed, order: result.order }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderParams {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateParams {
    pub status: OrderStatusType,
}
