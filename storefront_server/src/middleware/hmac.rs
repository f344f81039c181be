//! Webhook signature middleware for Actix Web.
//!
//! The gateway signs every webhook by computing an HMAC-SHA512 of the raw request body with the shared webhook
//! secret, and sends the hex digest in a header (`x-paystack-signature` by default).
//!
//! Wrap the webhook scope with [`HmacMiddlewareFactory`] so that handlers only ever see authenticated bodies. The body
//! is checked before anything tries to parse it, and is handed on untouched if the signature matches.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use gateway_tools::verify_signature;
use log::{error, trace, warn};
use pay_common::Secret;

use crate::errors::ServerError;

pub struct HmacMiddlewareFactory {
    signature_header: String,
    secret: Secret<String>,
}

impl HmacMiddlewareFactory {
    pub fn new(signature_header: &str, secret: Secret<String>) -> Self {
        HmacMiddlewareFactory { signature_header: signature_header.to_ascii_lowercase(), secret }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService {
            signature_header: self.signature_header.clone(),
            secret: self.secret.clone(),
            service: Rc::new(service),
        }))
    }
}

pub struct HmacMiddlewareService<S> {
    signature_header: String,
    secret: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.clone();
        let signature_header = self.signature_header.clone();
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature");
            if secret.is_empty() {
                error!("🔐️ No webhook secret is configured. Rejecting the webhook call.");
                return Err(ServerError::ConfigurationError("Webhook secret is not set".into()).into());
            }
            let signature = req
                .headers()
                .get(signature_header.as_str())
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .ok_or_else(|| {
                    warn!("🔐️ No signature found in webhook request. Denying access.");
                    ServerError::SignatureError
                })?;
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ServerError::InvalidRequestBody(e.to_string())
            })?;
            if verify_signature(secret.reveal(), data.as_ref(), &signature) {
                trace!("🔐️ Webhook signature check ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid webhook signature. Denying access.");
                Err(ServerError::SignatureError.into())
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
