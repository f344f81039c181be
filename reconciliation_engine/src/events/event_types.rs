use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// Which path delivered the payment signal that caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationSource {
    /// The customer was redirected back to the store and the store asked the gateway.
    Verification,
    /// The gateway told us directly.
    Webhook,
    /// An operator recorded the payment.
    Manual,
}

/// Emitted exactly once per order, by the call that moved it to paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub source: ConfirmationSource,
}

impl OrderPaidEvent {
    pub fn new(order: Order, source: ConfirmationSource) -> Self {
        Self { order, source }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderModifiedEvent {
    pub old_order: Order,
    pub new_order: Order,
}

impl OrderModifiedEvent {
    pub fn new(old_order: Order, new_order: Order) -> Self {
        Self { old_order, new_order }
    }
}
