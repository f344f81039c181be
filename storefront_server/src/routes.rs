//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate function. Keep this module neat and tidy 🙏
//!
//! Every handler that touches the database or the gateway is async. Both the verify and the webhook handlers only
//! respond once the reconciliation engine has finished with the request.
use std::str::FromStr;

use actix_web::{get, web, HttpResponse, Responder};
use gateway_tools::{TransactionVerifier, VerifiedTransaction, WebhookEvent};
use log::*;
use reconciliation_engine::{
    db_types::{NewOrder, OrderId},
    events::ConfirmationSource,
    order_objects::{ConfirmationResult, PaymentConfirmation},
    EmailSender,
    OrderApi,
    ReconciliationApi,
    ReconciliationError,
    StorefrontDatabase,
};

use crate::{
    broadcaster::OrderChangeBroadcaster,
    data_objects::{JsonResponse, StatusUpdateRequest, VerifyParams, VerifyResponse},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Verify  ----------------------------------------------------
route!(verify_payment => Get "/payments/verify" impl StorefrontDatabase, EmailSender, TransactionVerifier);
/// The customer has been redirected back from the gateway. Ask the gateway what happened and record it.
///
/// A successful payment that cannot be applied to its order is still reported as a success, with a warning. The
/// customer did pay, and the webhook or an operator can settle the order later.
pub async fn verify_payment<B, E, V>(
    api: web::Data<ReconciliationApi<B, E>>,
    verifier: web::Data<V>,
    query: web::Query<VerifyParams>,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    E: EmailSender,
    V: TransactionVerifier,
{
    let reference = query
        .into_inner()
        .reference
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServerError::InvalidRequestBody("A payment reference is required".into()))?;
    debug!("💻️ Verifying payment {reference}");
    let tx = verifier.verify_transaction(&reference).await.map_err(|e| {
        warn!("💻️ Could not verify payment {reference}. {e}");
        ServerError::from(e)
    })?;
    let response = apply_verified_transaction(api.as_ref(), tx).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn apply_verified_transaction<B, E>(
    api: &ReconciliationApi<B, E>,
    tx: VerifiedTransaction,
) -> Result<VerifyResponse, ServerError>
where
    B: StorefrontDatabase,
    E: EmailSender,
{
    let order_id = tx.order_id().map(OrderId::from);
    let mut response =
        VerifyResponse { status: tx.outcome, amount: tx.amount, reference: tx.reference.clone(), order_id, warning: None };
    if !tx.outcome.is_success() {
        info!("💻️ Payment {} has status {}. The order is left as it is.", tx.reference, tx.outcome);
        return Ok(response);
    }
    let Some(order_id) = response.order_id.clone() else {
        return Err(ServerError::UpstreamError(format!("Payment {} does not name an order", tx.reference)));
    };
    let confirmation = PaymentConfirmation::new(order_id, tx.reference.as_str(), tx.outcome)
        .with_customer_email(tx.customer_email.clone())
        .from_source(ConfirmationSource::Verification);
    match api.confirm_payment(confirmation).await {
        Ok(result) => {
            log_confirmation(&result, "verification");
            if let Some(mismatch) = amount_mismatch(&result, &tx) {
                warn!("💻️ {mismatch}");
                response.warning = Some(mismatch);
            }
        },
        Err(ReconciliationError::DatabaseError(e)) => return Err(ServerError::BackendError(e)),
        Err(e) => {
            warn!("💻️ Payment {} succeeded, but could not be applied. {e}", tx.reference);
            response.warning = Some(e.to_string());
        },
    }
    Ok(response)
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(gateway_webhook => Post "/webhook" impl StorefrontDatabase, EmailSender);
/// Receives payment events from the gateway. The signature has already been checked by the HMAC middleware.
///
/// Anything retrying cannot fix (unknown orders, conflicting references) is acknowledged so that the gateway stops
/// redelivering it. Storage failures are not, so that it tries again.
pub async fn gateway_webhook<B, E>(
    api: web::Data<ReconciliationApi<B, E>>,
    body: web::Bytes,
) -> Result<HttpResponse, ServerError>
where
    B: StorefrontDatabase,
    E: EmailSender,
{
    let event = WebhookEvent::from_slice(body.as_ref()).map_err(|e| {
        warn!("💻️ Could not parse webhook event. {e}");
        ServerError::MalformedEvent(e.to_string())
    })?;
    let data = match event {
        WebhookEvent::ChargeSuccess(data) => data,
        WebhookEvent::Ignored(event_type) => {
            debug!("💻️ Ignoring {event_type} webhook event");
            return Ok(HttpResponse::Ok().json(JsonResponse::success(format!("{event_type} ignored"))));
        },
    };
    let tx = VerifiedTransaction::try_from(data).map_err(|e| ServerError::MalformedEvent(e.to_string()))?;
    let Some(order_id) = tx.order_id().map(OrderId::from) else {
        return Err(ServerError::MalformedEvent(format!("Payment {} carries no order id", tx.reference)));
    };
    info!("💻️ Webhook reports payment {} for order {order_id}", tx.reference);
    let confirmation = PaymentConfirmation::new(order_id, tx.reference.as_str(), tx.outcome)
        .with_customer_email(tx.customer_email.clone())
        .from_source(ConfirmationSource::Webhook);
    match api.confirm_payment(confirmation).await {
        Ok(result) => {
            log_confirmation(&result, "webhook");
            if let Some(mismatch) = amount_mismatch(&result, &tx) {
                warn!("💻️ {mismatch}");
            }
            Ok(HttpResponse::Ok().json(JsonResponse::success("Payment recorded")))
        },
        Err(e) if e.is_permanent() => {
            error!("💻️ Webhook payment {} cannot be applied and will not be retried. {e}", tx.reference);
            Ok(HttpResponse::Ok().json(JsonResponse::failure(e)))
        },
        Err(e) => {
            error!("💻️ Webhook payment {} could not be recorded. The gateway will retry. {e}", tx.reference);
            Err(ServerError::from(e))
        },
    }
}

/// The gateway's amount is informational. A payment that does not match the order total is still recorded, but
/// somebody should look at it.
fn amount_mismatch(result: &ConfirmationResult, tx: &VerifiedTransaction) -> Option<String> {
    let order = result.order()?;
    (order.total_amount != tx.amount).then(|| {
        format!(
            "Payment {} was for {}, but order {} totals {}",
            tx.reference, tx.amount, order.order_id, order.total_amount
        )
    })
}

fn log_confirmation(result: &ConfirmationResult, path: &str) {
    match result {
        ConfirmationResult::Transitioned { order, side_effects } => {
            info!("💻️ Order {} paid via {path}. Side effects: {side_effects:?}", order.order_id)
        },
        ConfirmationResult::AlreadyPaid { order } => debug!("💻️ Order {} was already paid ({path})", order.order_id),
        ConfirmationResult::NotSuccessful { outcome } => debug!("💻️ Nothing to do for a {outcome} payment ({path})"),
    }
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_by_id => Get "/orders/{order_id}" impl StorefrontDatabase);
pub async fn order_by_id<B: StorefrontDatabase>(
    api: web::Data<OrderApi<B>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_order_id(&path.into_inner())?;
    let view = api.order_view(&order_id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    Ok(HttpResponse::Ok().json(view))
}

route!(create_order => Post "/orders" impl StorefrontDatabase);
pub async fn create_order<B: StorefrontDatabase>(
    api: web::Data<OrderApi<B>>,
    body: web::Json<NewOrder>,
) -> Result<HttpResponse, ServerError> {
    let order = api.create_order(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(update_order_status => Patch "/orders/{order_id}/status" impl StorefrontDatabase);
pub async fn update_order_status<B: StorefrontDatabase>(
    api: web::Data<OrderApi<B>>,
    path: web::Path<String>,
    body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_order_id(&path.into_inner())?;
    let request = body.into_inner();
    let order = api.modify_status_for_order(&order_id, request.status, request.tracking()).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[get("/orders/{order_id}/events")]
pub async fn order_events(
    broadcaster: web::Data<OrderChangeBroadcaster>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_order_id(&path.into_inner())?;
    debug!("💻️ New change subscriber for order {order_id}");
    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(broadcaster.event_stream(order_id)))
}

fn parse_order_id(s: &str) -> Result<OrderId, ServerError> {
    OrderId::from_str(s).map_err(|e| ServerError::InvalidRequestPath(e.to_string()))
}
