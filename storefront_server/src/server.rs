use std::{net::IpAddr, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::{future::ok, FutureExt};
use gateway_tools::GatewayApi;
use log::*;
use reconciliation_engine::{
    events::{EventHandlers, EventProducers},
    Mailer,
    OrderApi,
    ReconciliationApi,
    SqliteDatabase,
};

use crate::{
    broadcaster::OrderChangeBroadcaster,
    config::ServerConfig,
    errors::ServerError,
    helpers::get_remote_ip,
    middleware::HmacMiddlewareFactory,
    routes::{
        health,
        order_events,
        CreateOrderRoute,
        GatewayWebhookRoute,
        OrderByIdRoute,
        UpdateOrderStatusRoute,
        VerifyPaymentRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 64;
const BROADCAST_CAPACITY: usize = 256;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let broadcaster = OrderChangeBroadcaster::new(BROADCAST_CAPACITY);
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, broadcaster.hooks());
    let producers = handlers.producers();
    handlers.start_handlers();
    let srv = create_server_instance(config, db, producers, broadcaster)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    broadcaster: OrderChangeBroadcaster,
) -> Result<Server, ServerError> {
    if !config.gateway.is_configured() {
        warn!("🚨️ The payment gateway is not configured. Payments cannot be verified until SF_GATEWAY_SECRET_KEY is set.");
    }
    let verifier = GatewayApi::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let mailer = Mailer::from_settings(config.mail.api_url.as_deref(), config.mail.api_key.clone());
    let srv = HttpServer::new(move || {
        let reconciliation_api = ReconciliationApi::new(db.clone(), mailer.clone(), producers.clone())
            .with_email_settings(config.mail.settings.clone())
            .with_paid_status(config.paid_order_status);
        let orders_api = OrderApi::new(db.clone(), producers.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sf::access_log"))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(verifier.clone()))
            .app_data(web::Data::new(broadcaster.clone()));
        let api_scope = web::scope("/api")
            .service(VerifyPaymentRoute::<SqliteDatabase, Mailer, GatewayApi>::new())
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(order_events)
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new());
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let gateway_whitelist = config.gateway_whitelist.clone();
        let gateway_scope = web::scope("/gateway")
            .wrap(HmacMiddlewareFactory::new(&config.gateway.signature_header, config.gateway.webhook_secret.clone()))
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(&req, use_x_forwarded_for, use_forwarded);
                if is_whitelisted(peer_ip, gateway_whitelist.as_deref()) {
                    srv.call(req).boxed_local()
                } else {
                    ok(req.error_response(ServerError::ForbiddenPeer)).boxed_local()
                }
            })
            .service(GatewayWebhookRoute::<SqliteDatabase, Mailer>::new());
        app.service(health).service(api_scope).service(gateway_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("💻️ Server listening on {}:{}", config.host, config.port);
    Ok(srv)
}

pub fn is_whitelisted(peer_ip: Option<IpAddr>, whitelist: Option<&[IpAddr]>) -> bool {
    match (peer_ip, whitelist) {
        (_, None) => true,
        (Some(ip), Some(whitelist)) => {
            let allowed = whitelist.contains(&ip);
            if allowed {
                debug!("💻️ Gateway call from {ip}");
            } else {
                warn!("💻️ Gateway call from {ip}, which is not whitelisted. Denying access.");
            }
            allowed
        },
        (None, Some(_)) => {
            warn!("💻️ No IP address found for the gateway call. Denying access.");
            false
        },
    }
}
