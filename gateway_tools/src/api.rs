use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::GatewayConfig,
    data_objects::{GatewayResponse, TransactionData},
    GatewayApiError,
    VerifiedTransaction,
};

/// Anything that can tell us what happened to a transaction. The server depends on this rather than on
/// [`GatewayApi`] directly so that endpoint tests can substitute a mock.
#[allow(async_fn_in_trait)]
pub trait TransactionVerifier {
    async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, GatewayApiError>;
}

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        if !self.config.is_configured() {
            return Err(GatewayApiError::ConfigurationError("No gateway secret key has been set".into()));
        }
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.secret_key.reveal()))
            .map_err(|e| GatewayApiError::ConfigurationError(format!("The gateway secret key is invalid. {e}")))?;
        let url = self.url(path);
        trace!("🧾️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url).header(AUTHORIZATION, auth);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| self.transport_error(e))?;
        if response.status().is_success() {
            trace!("🧾️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| self.transport_error(e))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> GatewayApiError {
        if e.is_timeout() {
            GatewayApiError::Timeout(self.config.timeout.as_secs())
        } else {
            GatewayApiError::UpstreamError(e.to_string())
        }
    }

    /// Asks the gateway what became of the transaction with the given reference.
    pub async fn fetch_transaction(&self, reference: &str) -> Result<TransactionData, GatewayApiError> {
        // References end up in the redirect URL, so they are escaped before going into the path
        let path = format!("/transaction/verify/{}", urlencoding::encode(reference));
        let response = self.rest_query::<GatewayResponse<TransactionData>, ()>(Method::GET, &path, None).await?;
        if !response.status {
            return Err(GatewayApiError::MalformedResponse(format!(
                "Gateway reported a failed lookup for {reference}: {}",
                response.message
            )));
        }
        response.data.ok_or_else(|| GatewayApiError::MalformedResponse("Verification response had no data".into()))
    }
}

impl TransactionVerifier for GatewayApi {
    async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, GatewayApiError> {
        debug!("🧾️ Verifying transaction {reference}");
        let data = self.fetch_transaction(reference).await?;
        let tx = VerifiedTransaction::try_from(data)?;
        info!("🧾️ Transaction {reference} verified with outcome {}", tx.outcome);
        Ok(tx)
    }
}
