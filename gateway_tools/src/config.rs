use std::time::Duration;

use log::*;
use pay_common::Secret;

pub const DEFAULT_GATEWAY_URL: &str = "https://api.paystack.co";
pub const DEFAULT_SIGNATURE_HEADER: &str = "x-paystack-signature";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    /// The secret API key. Requests are refused outright while this is empty.
    pub secret_key: Secret<String>,
    /// The key the gateway signs webhook bodies with.
    pub webhook_secret: Secret<String>,
    pub signature_header: String,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            secret_key: Secret::default(),
            webhook_secret: Secret::default(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GatewayConfig {
    pub fn new(base_url: &str, secret_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: Secret::new(secret_key.to_string()),
            webhook_secret: Secret::new(secret_key.to_string()),
            ..Default::default()
        }
    }

    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("SF_GATEWAY_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                info!("🪛️ SF_GATEWAY_BASE_URL not set, using {DEFAULT_GATEWAY_URL}");
                DEFAULT_GATEWAY_URL.to_string()
            });
        let secret_key = std::env::var("SF_GATEWAY_SECRET_KEY").unwrap_or_else(|_| {
            error!(
                "🪛️ SF_GATEWAY_SECRET_KEY is not set. Payments cannot be verified and webhooks will be rejected until \
                 it is."
            );
            String::default()
        });
        let webhook_secret = std::env::var("SF_GATEWAY_WEBHOOK_SECRET").unwrap_or_else(|_| {
            debug!("🪛️ SF_GATEWAY_WEBHOOK_SECRET not set, webhooks are checked against the secret key");
            secret_key.clone()
        });
        let signature_header = std::env::var("SF_GATEWAY_SIGNATURE_HEADER")
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|_| DEFAULT_SIGNATURE_HEADER.to_string());
        let timeout = std::env::var("SF_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid SF_GATEWAY_TIMEOUT_SECS value '{s}': {e}. Using the default"))
                    .ok()
            })
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self {
            base_url,
            secret_key: Secret::new(secret_key),
            webhook_secret: Secret::new(webhook_secret),
            signature_header,
            timeout: Duration::from_secs(timeout),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }
}
