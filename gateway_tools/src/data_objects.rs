use chrono::{DateTime, Utc};
use pay_common::{Cents, PaymentOutcome};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::GatewayApiError;

//--------------------------------------  TransactionMetadata  -------------------------------------------------------
/// The metadata attached to a transaction when the payment was initiated. The storefront always tags `order_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    #[serde(default, deserialize_with = "string_or_number")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The gateway sends `""` instead of an object when no metadata was attached.
fn metadata_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<TransactionMetadata, D::Error> {
    let value = Value::deserialize(d)?;
    match value {
        Value::Object(_) => serde_json::from_value(value).map_err(serde::de::Error::custom),
        _ => Ok(TransactionMetadata::default()),
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

//--------------------------------------   TransactionData   ---------------------------------------------------------
/// The transaction object as the gateway serializes it, in both verification responses and webhook events.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionData {
    pub reference: String,
    pub status: String,
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub customer: Option<GatewayCustomer>,
    #[serde(default, deserialize_with = "metadata_or_empty")]
    pub metadata: TransactionMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayCustomer {
    #[serde(default)]
    pub email: Option<String>,
}

impl TransactionData {
    pub fn outcome(&self) -> PaymentOutcome {
        PaymentOutcome::from_gateway_status(&self.status)
    }

    /// The payer's email as the gateway knows it. Metadata captured at checkout takes precedence.
    pub fn customer_email(&self) -> Option<String> {
        self.metadata
            .customer_email
            .clone()
            .or_else(|| self.customer.as_ref().and_then(|c| c.email.clone()))
            .filter(|e| !e.trim().is_empty())
    }
}

//--------------------------------------  VerifiedTransaction  -------------------------------------------------------
/// A normalised verification result. This is the only form in which gateway data leaves this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedTransaction {
    pub outcome: PaymentOutcome,
    pub reference: String,
    pub amount: Cents,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    pub gateway_message: Option<String>,
    pub metadata: TransactionMetadata,
}

impl VerifiedTransaction {
    pub fn order_id(&self) -> Option<&str> {
        self.metadata.order_id.as_deref()
    }
}

impl TryFrom<TransactionData> for VerifiedTransaction {
    type Error = GatewayApiError;

    fn try_from(data: TransactionData) -> Result<Self, Self::Error> {
        let outcome = data.outcome();
        if outcome.is_success() && data.metadata.order_id.is_none() {
            return Err(GatewayApiError::MalformedResponse(format!(
                "Transaction {} succeeded but carries no order_id in its metadata",
                data.reference
            )));
        }
        let customer_email = data.customer_email();
        Ok(Self {
            outcome,
            reference: data.reference,
            amount: Cents::from(data.amount),
            currency: data.currency,
            customer_email,
            gateway_message: data.gateway_response,
            metadata: data.metadata,
        })
    }
}

/// The envelope wrapping every gateway API response.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayResponse<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

//--------------------------------------     WebhookEvent     --------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
struct RawWebhookEvent {
    event: String,
    #[serde(default)]
    data: Value,
}

/// A webhook notification, parsed only after its signature has been checked.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    /// `charge.success`. The only event that can move an order forward.
    ChargeSuccess(TransactionData),
    /// Any other event type. These are acknowledged and otherwise ignored.
    Ignored(String),
}

pub const CHARGE_SUCCESS: &str = "charge.success";

impl WebhookEvent {
    pub fn from_slice(body: &[u8]) -> Result<Self, GatewayApiError> {
        let raw = serde_json::from_slice::<RawWebhookEvent>(body).map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
        if raw.event != CHARGE_SUCCESS {
            return Ok(Self::Ignored(raw.event));
        }
        let data = serde_json::from_value::<TransactionData>(raw.data)
            .map_err(|e| GatewayApiError::MalformedResponse(format!("Invalid charge.success payload. {e}")))?;
        Ok(Self::ChargeSuccess(data))
    }

    pub fn event_type(&self) -> &str {
        match self {
            Self::ChargeSuccess(_) => CHARGE_SUCCESS,
            Self::Ignored(s) => s.as_str(),
        }
    }
}
