use std::time::Duration;

use async_stream::try_stream;
use futures::{stream::BoxStream, Stream, StreamExt};
use log::*;
use reconciliation_engine::{db_types::OrderId, order_objects::OrderView};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client,
    Response,
    StatusCode,
};
use serde::Deserialize;
use storefront_server::{
    broadcaster::ORDER_CHANGED_EVENT,
    data_objects::{OrderChangeNotice, VerifyResponse},
};
use url::Url;

use crate::{
    notifier::{OrderChangeFeed, OrderStatusSource},
    sse::SseParser,
    ClientError,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// What the customer's success page learns from the verify call made right after the gateway redirect.
#[derive(Debug, Clone, PartialEq)]
pub enum RedirectOutcome {
    /// The gateway answered. The response may still carry a warning if the order could not be updated.
    Verified(VerifyResponse),
    /// The verify call itself failed. The order may still be settled by the webhook, so the status notifier should
    /// keep watching.
    Unverified { warning: String },
}

#[derive(Clone)]
pub struct StorefrontClient {
    client: Client,
    server: Url,
}

impl StorefrontClient {
    pub fn new(server: &str) -> Result<Self, ClientError> {
        let server = Url::parse(server)?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent("Storefront Client")
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Initialization(e.to_string()))?;
        Ok(Self { client, server })
    }

    pub fn server(&self) -> &str {
        self.server.as_str()
    }

    /// Builds a URL from path segments, escaping each one.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.server.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(format!("{} cannot be a base URL", self.server)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn health(&self) -> Result<String, ClientError> {
        let url = self.url(&["health"])?;
        let res = self.client.get(url).timeout(REQUEST_TIMEOUT).send().await?;
        let res = check_status(res).await?;
        Ok(res.text().await?)
    }

    /// Fetches the full order projection. `None` if the server does not know the order.
    pub async fn order(&self, order_id: &OrderId) -> Result<Option<OrderView>, ClientError> {
        let url = self.url(&["api", "orders", order_id.as_str()])?;
        let res = self.client.get(url).timeout(REQUEST_TIMEOUT).send().await?;
        if res.status() == StatusCode::NOT_FOUND {
            debug!("📡️ Order {order_id} does not exist (yet)");
            return Ok(None);
        }
        let res = check_status(res).await?;
        Ok(Some(res.json::<OrderView>().await?))
    }

    pub async fn verify_payment(&self, reference: &str) -> Result<VerifyResponse, ClientError> {
        let mut url = self.url(&["api", "payments", "verify"])?;
        url.query_pairs_mut().append_pair("reference", reference);
        // The server waits on the gateway, so allow for its timeout on top of ours
        let res = self.client.get(url).timeout(REQUEST_TIMEOUT * 2).send().await?;
        let res = check_status(res).await?;
        Ok(res.json::<VerifyResponse>().await?)
    }

    /// Calls the verify endpoint once. Failures are turned into a warning rather than an error, since the webhook can
    /// still settle the order.
    pub async fn verify_on_redirect(&self, reference: &str) -> RedirectOutcome {
        match self.verify_payment(reference).await {
            Ok(response) => {
                if let Some(warning) = &response.warning {
                    warn!("📡️ Payment {reference} was verified with a warning: {warning}");
                }
                RedirectOutcome::Verified(response)
            },
            Err(e) => {
                warn!("📡️ Could not verify payment {reference}. {e}");
                RedirectOutcome::Unverified { warning: e.to_string() }
            },
        }
    }

    /// Opens the server-sent event stream for an order and yields each change notice. The stream ends when the server
    /// closes the connection.
    pub fn order_events(
        &self,
        order_id: &OrderId,
    ) -> impl Stream<Item = Result<OrderChangeNotice, ClientError>> + Send + 'static {
        let client = self.client.clone();
        let url = self.url(&["api", "orders", order_id.as_str(), "events"]);
        try_stream! {
            let url = url?;
            let res = client
                .get(url)
                .header(ACCEPT, "text/event-stream")
                .send()
                .await
                .map_err(ClientError::from)?;
            let res = check_status(res).await?;
            let mut body = res.bytes_stream();
            let mut parser = SseParser::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| ClientError::StreamError(e.to_string()))?;
                for event in parser.feed(&chunk) {
                    if event.event.as_deref() != Some(ORDER_CHANGED_EVENT) {
                        trace!("📡️ Skipping {:?} event", event.event);
                        continue;
                    }
                    let notice = serde_json::from_str::<OrderChangeNotice>(&event.data)
                        .map_err(|e| ClientError::JsonError(e.to_string()))?;
                    yield notice;
                }
            }
        }
    }
}

impl OrderStatusSource for StorefrontClient {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<OrderView>, ClientError> {
        self.order(order_id).await
    }
}

impl OrderChangeFeed for StorefrontClient {
    fn subscribe(&self, order_id: &OrderId) -> BoxStream<'static, Result<OrderChangeNotice, ClientError>> {
        self.order_events(order_id).boxed()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

async fn check_status(res: Response) -> Result<Response, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text).map(|b| b.error).unwrap_or(text);
    Err(ClientError::ServerError { status: status.as_u16(), message })
}
