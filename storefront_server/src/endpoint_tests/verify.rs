use actix_web::{http::StatusCode, test, web, App};
use gateway_tools::{GatewayApiError, PaymentOutcome};
use pay_common::Cents;
use reconciliation_engine::{
    db_types::{OrderId, OrderStatusType, PaymentStatus},
    test_utils::prepare_env::seed_checkout,
    MemoryMailer,
    SqliteDatabase,
};

use super::{
    helpers::{send, verified, TestContext},
    mocks::MockVerifier,
};
use crate::{data_objects::VerifyResponse, routes::VerifyPaymentRoute};

async fn call_verify(ctx: &TestContext, verifier: MockVerifier, uri: &str) -> (StatusCode, String) {
    let app = App::new()
        .app_data(web::Data::new(ctx.reconciliation_api()))
        .app_data(web::Data::new(verifier))
        .service(VerifyPaymentRoute::<SqliteDatabase, MemoryMailer, MockVerifier>::new());
    let service = test::init_service(app).await;
    let req = test::TestRequest::get().uri(uri).to_request();
    send(&service, req).await
}

#[actix_web::test]
async fn missing_reference() {
    let ctx = TestContext::new().await;
    let mut verifier = MockVerifier::new();
    verifier.expect_verify_transaction().never();
    let (status, body) = call_verify(&ctx, verifier, "/payments/verify").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("A payment reference is required"));
    let (status, _) = call_verify(&ctx, MockVerifier::new(), "/payments/verify?reference=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn successful_payment_marks_the_order_paid() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;
    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify_transaction()
        .withf(|reference| reference == "TXN-9")
        .times(1)
        .returning(|reference| Ok(verified("ORD-1001", reference, PaymentOutcome::Success)));
    let (status, body) = call_verify(&ctx, verifier, "/payments/verify?reference=TXN-9").await;
    assert_eq!(status, StatusCode::OK);
    let response: VerifyResponse = serde_json::from_str(&body).expect("Invalid verify response");
    assert_eq!(response.status, PaymentOutcome::Success);
    assert_eq!(response.reference, "TXN-9");
    assert_eq!(response.order_id, Some(OrderId::from("ORD-1001")));
    assert!(response.warning.is_none());

    let order = ctx.order_api().fetch_order(&OrderId::from("ORD-1001")).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.status, OrderStatusType::Processing);
    assert_eq!(order.payment_reference.as_deref(), Some("TXN-9"));
    assert_eq!(ctx.mailer.sent().len(), 1);
}

#[actix_web::test]
async fn short_payments_are_recorded_with_a_warning() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;
    let mut verifier = MockVerifier::new();
    verifier.expect_verify_transaction().returning(|reference| {
        let mut tx = verified("ORD-1001", reference, PaymentOutcome::Success);
        tx.amount = Cents::from_major(5);
        Ok(tx)
    });
    let (status, body) = call_verify(&ctx, verifier, "/payments/verify?reference=TXN-9").await;
    assert_eq!(status, StatusCode::OK);
    let response: VerifyResponse = serde_json::from_str(&body).expect("Invalid verify response");
    let warning = response.warning.expect("Expected an amount warning");
    assert!(warning.contains("ORD-1001"));
    assert!(warning.contains("500.00"));
    let order = ctx.order_api().fetch_order(&OrderId::from("ORD-1001")).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
}

#[actix_web::test]
async fn failed_payment_leaves_the_order_alone() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;
    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify_transaction()
        .returning(|reference| Ok(verified("ORD-1001", reference, PaymentOutcome::Failure)));
    let (status, body) = call_verify(&ctx, verifier, "/payments/verify?reference=TXN-9").await;
    assert_eq!(status, StatusCode::OK);
    let response: VerifyResponse = serde_json::from_str(&body).expect("Invalid verify response");
    assert_eq!(response.status, PaymentOutcome::Failure);

    let order = ctx.order_api().fetch_order(&OrderId::from("ORD-1001")).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.status, OrderStatusType::Pending);
    assert!(order.payment_reference.is_none());
    assert!(ctx.mailer.sent().is_empty());
}

#[actix_web::test]
async fn gateway_failures() {
    let ctx = TestContext::new().await;
    let mut verifier = MockVerifier::new();
    verifier.expect_verify_transaction().returning(|_| Err(GatewayApiError::Timeout(10)));
    let (status, body) = call_verify(&ctx, verifier, "/payments/verify?reference=TXN-9").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("within 10 seconds"));

    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify_transaction()
        .returning(|_| Err(GatewayApiError::QueryError { status: 404, message: "Transaction reference not found".into() }));
    let (status, _) = call_verify(&ctx, verifier, "/payments/verify?reference=TXN-9").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify_transaction()
        .returning(|_| Err(GatewayApiError::ConfigurationError("No secret key".into())));
    let (status, body) = call_verify(&ctx, verifier, "/payments/verify?reference=TXN-9").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("not configured"));
}

#[actix_web::test]
async fn payment_for_an_unknown_order_is_reported_with_a_warning() {
    let ctx = TestContext::new().await;
    let mut verifier = MockVerifier::new();
    verifier
        .expect_verify_transaction()
        .returning(|reference| Ok(verified("ORD-404", reference, PaymentOutcome::Success)));
    let (status, body) = call_verify(&ctx, verifier, "/payments/verify?reference=TXN-9").await;
    assert_eq!(status, StatusCode::OK);
    let response: VerifyResponse = serde_json::from_str(&body).expect("Invalid verify response");
    assert_eq!(response.status, PaymentOutcome::Success);
    let warning = response.warning.expect("Expected a warning");
    assert!(warning.contains("ORD-404"));
}

#[actix_web::test]
async fn verifying_twice_sends_one_email() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;
    for _ in 0..2 {
        let mut verifier = MockVerifier::new();
        verifier
            .expect_verify_transaction()
            .returning(|reference| Ok(verified("ORD-1001", reference, PaymentOutcome::Success)));
        let (status, body) = call_verify(&ctx, verifier, "/payments/verify?reference=TXN-9").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("warning"));
    }
    assert_eq!(ctx.mailer.sent().len(), 1);
}
