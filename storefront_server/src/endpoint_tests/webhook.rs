use actix_web::{http::StatusCode, test, web, App};
use pay_common::Secret;
use reconciliation_engine::{
    db_types::{OrderId, OrderStatusType, PaymentStatus},
    test_utils::prepare_env::seed_checkout,
    MemoryMailer,
    SqliteDatabase,
};

use super::helpers::{charge_success_event, send, sign, TestContext, SIGNATURE_HEADER, WEBHOOK_SECRET};
use crate::{middleware::HmacMiddlewareFactory, routes::GatewayWebhookRoute};

async fn post_webhook(ctx: &TestContext, secret: &str, body: String, signature: Option<String>) -> (StatusCode, String) {
    let hmac = HmacMiddlewareFactory::new(SIGNATURE_HEADER, Secret::new(secret.to_string()));
    let app = App::new()
        .app_data(web::Data::new(ctx.reconciliation_api()))
        .service(web::scope("/gateway").wrap(hmac).service(GatewayWebhookRoute::<SqliteDatabase, MemoryMailer>::new()));
    let service = test::init_service(app).await;
    let mut req = test::TestRequest::post().uri("/gateway/webhook").insert_header(("Content-Type", "application/json"));
    if let Some(sig) = signature {
        req = req.insert_header((SIGNATURE_HEADER, sig));
    }
    send(&service, req.set_payload(body).to_request()).await
}

async fn payment_status(ctx: &TestContext, order_id: &str) -> PaymentStatus {
    ctx.order_api().fetch_order(&OrderId::from(order_id)).await.unwrap().unwrap().payment_status
}

#[actix_web::test]
async fn unsigned_or_badly_signed_events_are_rejected() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;
    let body = charge_success_event(Some("ORD-1001"), "TXN-9");

    let (status, _) = post_webhook(&ctx, WEBHOOK_SECRET, body.clone(), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = gateway_tools::calculate_signature("not-the-secret", body.as_bytes());
    let (status, _) = post_webhook(&ctx, WEBHOOK_SECRET, body.clone(), Some(forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_webhook(&ctx, WEBHOOK_SECRET, body.clone(), Some("zz-not-hex".into())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Signed, then tampered with
    let sig = sign(&body);
    let tampered = body.replace("50000", "100");
    let (status, _) = post_webhook(&ctx, WEBHOOK_SECRET, tampered, Some(sig)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(payment_status(&ctx, "ORD-1001").await, PaymentStatus::Pending);
    assert!(ctx.mailer.sent().is_empty());
}

#[actix_web::test]
async fn missing_secret_is_a_server_error() {
    let ctx = TestContext::new().await;
    let body = charge_success_event(Some("ORD-1001"), "TXN-9");
    let sig = sign(&body);
    let (status, _) = post_webhook(&ctx, "", body, Some(sig)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn signed_charge_success_pays_the_order() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;
    let body = charge_success_event(Some("ORD-1001"), "TXN-9");
    let sig = sign(&body);
    let (status, response) = post_webhook(&ctx, WEBHOOK_SECRET, body, Some(sig)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains(r#""success":true"#));
    assert_eq!(payment_status(&ctx, "ORD-1001").await, PaymentStatus::Paid);
    let sent = ctx.mailer.sent();
    assert_eq!(sent.len(), 1);
}

#[actix_web::test]
async fn redelivered_events_are_applied_once() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;
    let body = charge_success_event(Some("ORD-1001"), "TXN-9");
    let sig = sign(&body);
    for _ in 0..3 {
        let (status, _) = post_webhook(&ctx, WEBHOOK_SECRET, body.clone(), Some(sig.clone())).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(payment_status(&ctx, "ORD-1001").await, PaymentStatus::Paid);
    assert_eq!(ctx.mailer.sent().len(), 1);
}

#[actix_web::test]
async fn other_event_types_are_acknowledged() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;
    let body = serde_json::json!({ "event": "transfer.success", "data": { "reference": "TRF-1" } }).to_string();
    let sig = sign(&body);
    let (status, response) = post_webhook(&ctx, WEBHOOK_SECRET, body, Some(sig)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("transfer.success ignored"));
    assert_eq!(payment_status(&ctx, "ORD-1001").await, PaymentStatus::Pending);
}

#[actix_web::test]
async fn malformed_events_are_bad_requests() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;

    let body = "{ this is not json".to_string();
    let sig = sign(&body);
    let (status, _) = post_webhook(&ctx, WEBHOOK_SECRET, body, Some(sig)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = charge_success_event(None, "TXN-9");
    let sig = sign(&body);
    let (status, response) = post_webhook(&ctx, WEBHOOK_SECRET, body, Some(sig)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response.contains("order_id"));

    assert_eq!(payment_status(&ctx, "ORD-1001").await, PaymentStatus::Pending);
}

#[actix_web::test]
async fn unknown_orders_are_acknowledged_but_not_applied() {
    let ctx = TestContext::new().await;
    let body = charge_success_event(Some("ORD-404"), "TXN-9");
    let sig = sign(&body);
    let (status, response) = post_webhook(&ctx, WEBHOOK_SECRET, body, Some(sig)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains(r#""success":false"#));
    assert!(ctx.mailer.sent().is_empty());
}

#[actix_web::test]
async fn payments_for_cancelled_orders_are_acknowledged_but_not_applied() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;
    let id = OrderId::from("ORD-1001");
    ctx.order_api().modify_status_for_order(&id, OrderStatusType::Cancelled, None).await.unwrap();
    let body = charge_success_event(Some("ORD-1001"), "TXN-9");
    let sig = sign(&body);
    let (status, response) = post_webhook(&ctx, WEBHOOK_SECRET, body, Some(sig)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains(r#""success":false"#));
    assert!(response.contains("cancelled"));
    let order = ctx.order_api().fetch_order(&id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(ctx.mailer.sent().is_empty());
}
