use std::fmt::Display;

use chrono::{DateTime, Utc};
use pay_common::{Cents, PaymentOutcome};
use reconciliation_engine::db_types::{Order, OrderId, OrderStatusType, PaymentStatus, TrackingInfo};
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

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyParams {
    #[serde(default)]
    pub reference: Option<String>,
}

/// The result of the verify-on-redirect call.
///
/// `status` is the gateway's verdict. `warning` is set when the payment went through but the order could not be
/// updated, e.g. because it does not exist or already carries another payment. The webhook may still settle it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: PaymentOutcome,
    pub amount: Cents,
    pub reference: String,
    pub order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
    #[serde(default)]
    pub tracking_code: Option<String>,
    #[serde(default)]
    pub tracking_url: Option<String>,
}

impl StatusUpdateRequest {
    pub fn tracking(&self) -> Option<TrackingInfo> {
        let tracking = TrackingInfo { tracking_code: self.tracking_code.clone(), tracking_url: self.tracking_url.clone() };
        (!tracking.is_empty()).then_some(tracking)
    }
}

/// Pushed to subscribers of an order's event stream whenever the order row changes. It only says *that* something
/// changed; subscribers fetch the order to see the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderChangeNotice {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderChangeNotice {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            status: order.status,
            payment_status: order.payment_status,
            updated_at: order.updated_at,
        }
    }
}
