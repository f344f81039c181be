use std::{env, net::IpAddr, str::FromStr};

use gateway_tools::GatewayConfig;
use log::*;
use pay_common::{parse_boolean_flag, Secret};
use reconciliation_engine::{db_types::OrderStatusType, EmailSettings};

const DEFAULT_SF_HOST: &str = "127.0.0.1";
const DEFAULT_SF_PORT: u16 = 8480;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.db";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Credentials and endpoint for the card payment gateway. The webhook secret is also used to check webhook
    /// signatures.
    pub gateway: GatewayConfig,
    /// If supplied, requests against the `/gateway` endpoints are only accepted from these addresses.
    /// To explicitly disable the whitelist, set `SF_GATEWAY_IP_WHITELIST` to "false", "none", or "0".
    pub gateway_whitelist: Option<Vec<IpAddr>>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// The status a freshly paid order moves to. Either `processing` or `confirmed`.
    pub paid_order_status: OrderStatusType,
    pub mail: MailConfig,
}

#[derive(Clone, Debug, Default)]
pub struct MailConfig {
    /// The transactional mail API. Without it, confirmation emails are only logged.
    pub api_url: Option<String>,
    pub api_key: Secret<String>,
    pub settings: EmailSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SF_HOST.to_string(),
            port: DEFAULT_SF_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            gateway: GatewayConfig::default(),
            gateway_whitelist: None,
            use_x_forwarded_for: false,
            use_forwarded: false,
            paid_order_status: OrderStatusType::Processing,
            mail: MailConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SF_HOST").ok().unwrap_or_else(|| DEFAULT_SF_HOST.into());
        let port = env::var("SF_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for SF_PORT. {e} Using the default, {DEFAULT_SF_PORT}, instead.");
                    DEFAULT_SF_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SF_PORT);
        let database_url = env::var("SF_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SF_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let gateway = GatewayConfig::new_from_env_or_default();
        let gateway_whitelist = env::var("SF_GATEWAY_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &gateway_whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The gateway IP whitelist was configured, but is empty. The server will run, but won't accept \
                     any webhook calls."
                );
            },
            None => info!("🪛️ No gateway IP whitelist is set. Only signature checks will be used."),
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Gateway IP whitelist: {addrs}");
            },
        }
        let use_x_forwarded_for = parse_boolean_flag(env::var("SF_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("SF_USE_FORWARDED").ok(), false);
        let paid_order_status = env::var("SF_PAID_ORDER_STATUS")
            .ok()
            .map(|s| paid_status_from_str(&s))
            .unwrap_or(OrderStatusType::Processing);
        let mail = MailConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            gateway,
            gateway_whitelist,
            use_x_forwarded_for,
            use_forwarded,
            paid_order_status,
            mail,
        }
    }
}

impl MailConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("SF_MAIL_API_URL").ok().filter(|s| !s.trim().is_empty());
        let api_key = env::var("SF_MAIL_API_KEY").ok().unwrap_or_default();
        if api_url.is_some() && api_key.is_empty() {
            warn!("🪛️ SF_MAIL_API_URL is set, but SF_MAIL_API_KEY is not. The mail service will probably refuse us.");
        }
        let mut settings = EmailSettings::default();
        if let Ok(from) = env::var("SF_MAIL_FROM") {
            settings.from = from;
        }
        if let Ok(name) = env::var("SF_STORE_NAME") {
            settings.store_name = name;
        }
        Self { api_url, api_key: Secret::new(api_key), settings }
    }
}

fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0"].contains(&s.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ Gateway IP whitelist is disabled. If this is not what you want, set SF_GATEWAY_IP_WHITELIST to a \
             comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let addrs = s
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            IpAddr::from_str(s)
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in SF_GATEWAY_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect();
    Some(addrs)
}

fn paid_status_from_str(s: &str) -> OrderStatusType {
    match OrderStatusType::from_str(s) {
        Ok(status) if status.is_paid_entry_status() => status,
        _ => {
            warn!("🪛️ SF_PAID_ORDER_STATUS must be 'processing' or 'confirmed', not '{s}'. Using processing.");
            OrderStatusType::Processing
        },
    }
}
