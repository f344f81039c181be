use pay_common::PaymentOutcome;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId, OrderItem},
    dispatch::SideEffectReport,
    events::ConfirmationSource,
};

/// A payment signal, from whichever path delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub order_id: OrderId,
    pub reference: String,
    pub outcome: PaymentOutcome,
    /// The payer's address according to the gateway. Only used if the order has none of its own.
    pub customer_email: Option<String>,
    pub source: ConfirmationSource,
}

impl PaymentConfirmation {
    pub fn new<S: Into<String>>(order_id: OrderId, reference: S, outcome: PaymentOutcome) -> Self {
        Self { order_id, reference: reference.into(), outcome, customer_email: None, source: ConfirmationSource::Manual }
    }

    pub fn with_customer_email(mut self, email: Option<String>) -> Self {
        self.customer_email = email;
        self
    }

    pub fn from_source(mut self, source: ConfirmationSource) -> Self {
        self.source = source;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ConfirmationResult {
    /// The gateway did not report a success. Nothing was changed.
    NotSuccessful { outcome: PaymentOutcome },
    /// Someone else already recorded this payment. Nothing was changed.
    AlreadyPaid { order: Order },
    /// This call recorded the payment and ran the side effects.
    Transitioned { order: Order, side_effects: SideEffectReport },
}

impl ConfirmationResult {
    pub fn order(&self) -> Option<&Order> {
        match self {
            Self::NotSuccessful { .. } => None,
            Self::AlreadyPaid { order } | Self::Transitioned { order, .. } => Some(order),
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transitioned { .. })
    }
}

/// Everything a client needs to render an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}
