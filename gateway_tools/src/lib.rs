//! Everything the storefront needs to talk to the card payment gateway: the transaction verification client, the
//! typed schema of the gateway's webhook events, and the HMAC helpers used to authenticate those events.
mod api;
mod config;
mod error;
mod signature;

pub mod data_objects;

pub use api::{GatewayApi, TransactionVerifier};
pub use config::GatewayConfig;
pub use data_objects::{TransactionMetadata, VerifiedTransaction, WebhookEvent};
pub use pay_common::PaymentOutcome;
pub use error::GatewayApiError;
pub use signature::{calculate_signature, verify_signature};
