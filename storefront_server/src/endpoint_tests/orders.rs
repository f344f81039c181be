use std::pin::Pin;

use actix_web::{
    body::MessageBody,
    http::{header, StatusCode},
    test,
    web,
    App,
};
use futures::future::poll_fn;
use gateway_tools::PaymentOutcome;
use reconciliation_engine::{
    db_types::{Order, OrderId, OrderStatusType, PaymentStatus},
    order_objects::{OrderView, PaymentConfirmation},
    test_utils::prepare_env::{checkout_order, seed_checkout},
    SqliteDatabase,
};
use serde_json::json;

use super::helpers::{send, TestContext};
use crate::{
    broadcaster::OrderChangeBroadcaster,
    data_objects::OrderChangeNotice,
    routes::{order_events, CreateOrderRoute, OrderByIdRoute, UpdateOrderStatusRoute},
};

macro_rules! order_service {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($ctx.order_api()))
                .service(CreateOrderRoute::<SqliteDatabase>::new())
                .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
                .service(OrderByIdRoute::<SqliteDatabase>::new()),
        )
        .await
    };
}

async fn pay(ctx: &TestContext, order_id: &str, reference: &str) {
    let confirmation = PaymentConfirmation::new(order_id.into(), reference, PaymentOutcome::Success);
    ctx.reconciliation_api().confirm_payment(confirmation).await.expect("Payment should be recorded");
}

fn status_update(status: &str) -> serde_json::Value {
    json!({ "status": status })
}

#[actix_web::test]
async fn create_and_fetch_an_order() {
    let ctx = TestContext::new().await;
    let service = order_service!(ctx);
    let new_order = checkout_order("ORD-2001", "user-9");
    let req = test::TestRequest::post().uri("/orders").set_json(&new_order).to_request();
    let (status, body) = send(&service, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let order: Order = serde_json::from_str(&body).expect("Invalid order JSON");
    assert_eq!(order.order_id, OrderId::from("ORD-2001"));
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.payment_reference.is_none());

    let req = test::TestRequest::get().uri("/orders/ORD-2001").to_request();
    let (status, body) = send(&service, req).await;
    assert_eq!(status, StatusCode::OK);
    let view: OrderView = serde_json::from_str(&body).expect("Invalid order view JSON");
    assert_eq!(view.order.order_id, OrderId::from("ORD-2001"));
    assert_eq!(view.items.len(), 2);

    // The same order id cannot be placed twice
    let req = test::TestRequest::post().uri("/orders").set_json(&new_order).to_request();
    let (status, body) = send(&service, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("already exists"));
}

#[actix_web::test]
async fn orders_that_do_not_add_up_are_rejected() {
    let ctx = TestContext::new().await;
    let service = order_service!(ctx);
    let mut new_order = checkout_order("ORD-2002", "user-9");
    new_order.total_amount = new_order.total_amount + pay_common::Cents::from(1);
    let req = test::TestRequest::post().uri("/orders").set_json(&new_order).to_request();
    let (status, body) = send(&service, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid order"));

    let req = test::TestRequest::get().uri("/orders/ORD-2002").to_request();
    let (status, _) = send(&service, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unknown_order() {
    let ctx = TestContext::new().await;
    let service = order_service!(ctx);
    let req = test::TestRequest::get().uri("/orders/ORD-404").to_request();
    let (status, body) = send(&service, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("ORD-404"));

    let req = test::TestRequest::patch().uri("/orders/ORD-404/status").set_json(status_update("shipped")).to_request();
    let (status, _) = send(&service, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn fulfilment_follows_payment() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;
    let service = order_service!(ctx);

    // Nothing ships before it is paid
    let req = test::TestRequest::patch().uri("/orders/ORD-1001/status").set_json(status_update("shipped")).to_request();
    let (status, body) = send(&service, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("cannot move from pending to shipped"));

    pay(&ctx, "ORD-1001", "TXN-9").await;

    let update = json!({
        "status": "shipped",
        "tracking_code": "TRK-123",
        "tracking_url": "https://track.example/TRK-123"
    });
    let req = test::TestRequest::patch().uri("/orders/ORD-1001/status").set_json(update).to_request();
    let (status, body) = send(&service, req).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).expect("Invalid order JSON");
    assert_eq!(order.status, OrderStatusType::Shipped);
    assert_eq!(order.tracking_code.as_deref(), Some("TRK-123"));
    assert_eq!(order.payment_reference.as_deref(), Some("TXN-9"));

    let req = test::TestRequest::patch().uri("/orders/ORD-1001/status").set_json(status_update("delivered")).to_request();
    let (status, _) = send(&service, req).await;
    assert_eq!(status, StatusCode::OK);

    // Delivered orders do not go back
    let req = test::TestRequest::patch().uri("/orders/ORD-1001/status").set_json(status_update("pending")).to_request();
    let (status, _) = send(&service, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn unpaid_orders_cannot_be_refunded() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;
    let service = order_service!(ctx);
    let req = test::TestRequest::patch().uri("/orders/ORD-1001/status").set_json(status_update("refunded")).to_request();
    let (status, _) = send(&service, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = test::TestRequest::patch().uri("/orders/ORD-1001/status").set_json(status_update("cancelled")).to_request();
    let (status, body) = send(&service, req).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).expect("Invalid order JSON");
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn unknown_statuses_are_bad_requests() {
    let ctx = TestContext::new().await;
    seed_checkout(&ctx.db).await;
    let service = order_service!(ctx);
    let req = test::TestRequest::patch().uri("/orders/ORD-1001/status").set_json(status_update("teleported")).to_request();
    let (status, _) = send(&service, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn change_events_are_streamed_to_subscribers() {
    let broadcaster = OrderChangeBroadcaster::new(16);
    let app = App::new().app_data(web::Data::new(broadcaster.clone())).service(order_events);
    let service = test::init_service(app).await;
    let req = test::TestRequest::get().uri("/orders/ORD-1001/events").to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let content_type = res.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert_eq!(content_type, "text/event-stream");

    let mut body = res.into_body();
    let first = poll_fn(|cx| Pin::new(&mut body).poll_next(cx)).await.unwrap().unwrap();
    assert_eq!(&first[..], b": connected\n\n");

    let notice = |id: &str, status| OrderChangeNotice {
        order_id: OrderId::from(id),
        status,
        payment_status: PaymentStatus::Paid,
        updated_at: chrono::Utc::now(),
    };
    // Other orders are filtered out
    broadcaster.publish(notice("ORD-9999", OrderStatusType::Processing));
    broadcaster.publish(notice("ORD-1001", OrderStatusType::Processing));
    let frame = poll_fn(|cx| Pin::new(&mut body).poll_next(cx)).await.unwrap().unwrap();
    let frame = String::from_utf8_lossy(&frame);
    assert!(frame.starts_with("event: order_changed\ndata: "));
    assert!(frame.contains(r#""order_id":"ORD-1001""#));
    assert!(frame.contains(r#""status":"processing""#));
}
