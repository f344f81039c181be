use std::str::FromStr;

use cucumber::{given, then, when};
use pay_common::{Cents, PaymentOutcome};
use reconciliation_engine::{
    db_types::{NewCartItem, NewOrder, OrderId, OrderStatusType, PaymentStatus},
    events::{ConfirmationSource, EventProducers},
    order_objects::PaymentConfirmation,
    CartManagement,
    OrderApi,
    OrderManagement,
    ReconciliationError,
};

use crate::cucumber::StorefrontWorld;

#[given(expr = "customer {word} has {int} item(s) in their cart")]
async fn fill_cart(world: &mut StorefrontWorld, user_id: String, count: i64) {
    let db = world.system().await.api.db();
    for i in 0..count {
        db.add_cart_item(NewCartItem::new(user_id.as_str(), format!("sku-{i}"), 1)).await.expect("Error adding to cart");
    }
}

#[given(expr = "an order {word} for customer {word} totalling {word}")]
async fn place_order(world: &mut StorefrontWorld, order_id: String, user_id: String, total: String) {
    let total = Cents::from_str(&total).expect("Not a valid amount");
    let order = NewOrder::new(order_id.into(), total).for_user(user_id).with_email("buyer@example.com");
    world.system().await.api.db().insert_order(order).await.expect("Error placing order");
}

#[given(expr = "the merchant cancels order {word}")]
async fn cancel_order(world: &mut StorefrontWorld, order_id: String) {
    let db = world.system().await.api.db().clone();
    let orders = OrderApi::new(db, EventProducers::default());
    orders
        .modify_status_for_order(&OrderId::from(order_id), OrderStatusType::Cancelled, None)
        .await
        .expect("Error cancelling order");
}

#[when(expr = "the customer returns and payment {word} for order {word} verifies as {word}")]
async fn verify(world: &mut StorefrontWorld, reference: String, order_id: String, status: String) {
    let outcome = PaymentOutcome::from_gateway_status(&status);
    confirm(world, reference, order_id, outcome, ConfirmationSource::Verification).await;
}

#[when(expr = "the gateway webhook reports payment {word} for order {word} {int} time(s)")]
async fn webhook(world: &mut StorefrontWorld, reference: String, order_id: String, times: u32) {
    for _ in 0..times {
        confirm(world, reference.clone(), order_id.clone(), PaymentOutcome::Success, ConfirmationSource::Webhook).await;
    }
}

async fn confirm(
    world: &mut StorefrontWorld,
    reference: String,
    order_id: String,
    outcome: PaymentOutcome,
    source: ConfirmationSource,
) {
    let confirmation = PaymentConfirmation::new(order_id.into(), reference, outcome).from_source(source);
    let result = world.system().await.api.confirm_payment(confirmation).await;
    world.last_result = Some(result);
}

#[then(expr = "order {word} is paid with reference {word}")]
async fn order_is_paid(world: &mut StorefrontWorld, order_id: String, reference: String) {
    let order = fetch(world, &order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.payment_reference.as_deref(), Some(reference.as_str()));
}

#[then(expr = "order {word} is still awaiting payment")]
async fn order_is_unpaid(world: &mut StorefrontWorld, order_id: String) {
    let order = fetch(world, &order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.payment_reference.is_none());
}

#[then(expr = "order {word} has status {word}")]
async fn order_status(world: &mut StorefrontWorld, order_id: String, status: String) {
    let order = fetch(world, &order_id).await;
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    assert_eq!(order.status, expected);
}

#[then(expr = "the cart of {word} holds {int} item(s)")]
async fn cart_size(world: &mut StorefrontWorld, user_id: String, count: usize) {
    let cart = world.api().db().fetch_cart_for_user(&user_id).await.expect("Error fetching cart");
    assert_eq!(cart.len(), count);
}

#[then(expr = "{int} confirmation email(s) has/have been sent")]
async fn emails_sent(world: &mut StorefrontWorld, count: usize) {
    assert_eq!(world.mailer().attempts(), count);
}

#[then(expr = "the last confirmation is rejected as a conflict with {word}")]
async fn rejected_conflict(world: &mut StorefrontWorld, existing_ref: String) {
    match world.last_result.as_ref() {
        Some(Err(ReconciliationError::ReferenceConflict { existing, .. })) => assert_eq!(existing, &existing_ref),
        other => panic!("Expected a reference conflict, got {other:?}"),
    }
}

#[then(expr = "the last confirmation is rejected because the order is {word}")]
async fn rejected_not_payable(world: &mut StorefrontWorld, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    match world.last_result.as_ref() {
        Some(Err(ReconciliationError::OrderNotPayable { status, .. })) => assert_eq!(*status, expected),
        other => panic!("Expected the order to refuse payment, got {other:?}"),
    }
}

async fn fetch(world: &mut StorefrontWorld, order_id: &str) -> reconciliation_engine::db_types::Order {
    world
        .api()
        .db()
        .fetch_order_by_order_id(&OrderId::from(order_id))
        .await
        .expect("Error fetching order")
        .expect("Order does not exist")
}
