use std::fmt::Debug;

use log::*;

use crate::{
    api::{errors::OrderApiError, order_objects::OrderView},
    db::traits::{InsertOrderResult, OrderManagement, OrderQueryFilter, StorefrontDatabase},
    db_types::{NewOrder, Order, OrderId, OrderStatusType, TrackingInfo},
    events::{EventProducers, OrderModifiedEvent},
};

/// Order creation, reads, and the fulfilment lifecycle that follows payment.
///
/// Payment itself is not handled here; see [`ReconciliationApi`](crate::ReconciliationApi).
pub struct OrderApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderApi")
    }
}

impl<B> OrderApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderApi<B>
where B: StorefrontDatabase
{
    /// Stores a new pending order. Submitting the same `order_id` twice is an error, and the stored order is left
    /// untouched.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, OrderApiError> {
        validate_new_order(&order)?;
        let order_id = order.order_id.clone();
        let result = self.db.insert_order(order).await.map_err(|e| OrderApiError::DatabaseError(e.to_string()))?;
        match result {
            InsertOrderResult::Inserted(order) => {
                info!("🔄️📦️ Order {order_id} ({}) created for {}", order.order_number, order.total_amount);
                Ok(order)
            },
            InsertOrderResult::AlreadyExists(_) => Err(OrderApiError::DuplicateOrder(order_id)),
        }
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderApiError> {
        self.db.fetch_order_by_order_id(order_id).await.map_err(|e| OrderApiError::DatabaseError(e.to_string()))
    }

    /// The full projection of an order, including its line items. This is a pure read.
    pub async fn order_view(&self, order_id: &OrderId) -> Result<Option<OrderView>, OrderApiError> {
        let Some(order) = self.fetch_order(order_id).await? else {
            return Ok(None);
        };
        let items =
            self.db.fetch_order_items(order_id).await.map_err(|e| OrderApiError::DatabaseError(e.to_string()))?;
        Ok(Some(OrderView { order, items }))
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderApiError> {
        self.db.search_orders(query).await.map_err(|e| OrderApiError::DatabaseError(e.to_string()))
    }

    /// Changes the fulfilment status of an order.
    ///
    /// | From \ To   | processing | confirmed | shipped | delivered | cancelled | refunded |
    /// |-------------|------------|-----------|---------|-----------|-----------|----------|
    /// | pending     | Err (1)    | Err (1)   | Err     | Err       | Ok        | Err      |
    /// | processing  | Err        | Ok        | Ok      | Err       | Ok        | Ok (2)   |
    /// | confirmed   | Err        | Err       | Ok      | Err       | Ok        | Ok (2)   |
    /// | shipped     | Err        | Err       | Err     | Ok        | Err       | Ok (2)   |
    /// | delivered   | Err        | Err       | Err     | Err       | Err       | Ok (2)   |
    /// | cancelled   | Err        | Err       | Err     | Err       | Err       | Err      |
    /// | refunded    | Err        | Err       | Err     | Err       | Err       | Err      |
    ///
    /// 1. Only payment reconciliation moves an order out of `pending`.
    /// 2. Refunds are only possible for paid orders.
    ///
    /// Tracking details, if given, are stored along with the new status. The update is conditional on the status
    /// the check was made against, so two operators cannot both apply conflicting transitions.
    pub async fn modify_status_for_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        tracking: Option<TrackingInfo>,
    ) -> Result<Order, OrderApiError> {
        let old_order =
            self.fetch_order(order_id).await?.ok_or_else(|| OrderApiError::OrderNotFound(order_id.clone()))?;
        check_transition(&old_order, new_status)?;
        let new_order = self
            .db
            .update_order_status(order_id, old_order.status, new_status, tracking)
            .await
            .map_err(|e| OrderApiError::DatabaseError(e.to_string()))?
            .ok_or_else(|| OrderApiError::ConcurrentModification(order_id.clone()))?;
        info!("🔄️📦️ Order {order_id} moved from {} to {}", old_order.status, new_order.status);
        for emitter in &self.producers.order_modified_producer {
            emitter.publish_event(OrderModifiedEvent::new(old_order.clone(), new_order.clone())).await;
        }
        Ok(new_order)
    }
}

fn validate_new_order(order: &NewOrder) -> Result<(), OrderApiError> {
    if order.order_id.as_str().trim().is_empty() {
        return Err(OrderApiError::InvalidOrder("order_id cannot be empty".into()));
    }
    if order.total_amount.value() < 0 || order.delivery_fee.value() < 0 {
        return Err(OrderApiError::InvalidOrder("amounts cannot be negative".into()));
    }
    for item in &order.items {
        if item.quantity <= 0 {
            return Err(OrderApiError::InvalidOrder(format!("{} has a non-positive quantity", item.product_id)));
        }
        let prices = [Some(item.unit_price), item.original_price, item.discounted_price, item.savings_amount];
        if prices.into_iter().flatten().any(|p| p.value() < 0) {
            return Err(OrderApiError::InvalidOrder(format!("{} has a negative price", item.product_id)));
        }
    }
    if order.items.is_empty() {
        return Ok(());
    }
    let calculated = order
        .calculated_total()
        .ok_or_else(|| OrderApiError::InvalidOrder("the order total is too large".into()))?;
    if calculated != order.total_amount {
        return Err(OrderApiError::InvalidOrder(format!(
            "total {} does not match the items and delivery fee ({calculated})",
            order.total_amount
        )));
    }
    Ok(())
}

fn check_transition(order: &Order, to: OrderStatusType) -> Result<(), OrderApiError> {
    use OrderStatusType::*;
    let from = order.status;
    let allowed = match (from, to) {
        (Pending, Cancelled) => true,
        (Processing, Confirmed | Shipped | Cancelled | Refunded) => true,
        (Confirmed, Shipped | Cancelled | Refunded) => true,
        (Shipped, Delivered | Refunded) => true,
        (Delivered, Refunded) => true,
        _ => false,
    };
    if !allowed {
        debug!("🔄️📦️ Rejected transition for order {} from {from} to {to}", order.order_id);
        return Err(OrderApiError::ForbiddenTransition { from, to });
    }
    if to == Refunded && !order.is_paid() {
        return Err(OrderApiError::NotPaid(order.order_id.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use pay_common::Cents;

    use super::*;
    use crate::db_types::PaymentStatus;

    fn order(status: OrderStatusType, payment_status: PaymentStatus) -> Order {
        Order {
            id: 1,
            order_id: "ORD-1".into(),
            order_number: "SF-000001".into(),
            user_id: None,
            customer_email: None,
            total_amount: Cents::from(100),
            delivery_fee: Cents::default(),
            status,
            payment_status,
            payment_reference: (payment_status == PaymentStatus::Paid).then(|| "T".to_string()),
            delivery_method: None,
            tracking_code: None,
            tracking_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fulfilment_transitions() {
        use OrderStatusType::*;
        let paid = |s| order(s, PaymentStatus::Paid);
        assert!(check_transition(&order(Pending, PaymentStatus::Pending), Cancelled).is_ok());
        assert!(check_transition(&order(Pending, PaymentStatus::Pending), Processing).is_err());
        assert!(check_transition(&order(Pending, PaymentStatus::Pending), Shipped).is_err());
        assert!(check_transition(&paid(Processing), Shipped).is_ok());
        assert!(check_transition(&paid(Processing), Confirmed).is_ok());
        assert!(check_transition(&paid(Processing), Processing).is_err());
        assert!(check_transition(&paid(Confirmed), Processing).is_err());
        assert!(check_transition(&paid(Shipped), Delivered).is_ok());
        assert!(check_transition(&paid(Shipped), Cancelled).is_err());
        assert!(check_transition(&paid(Delivered), Refunded).is_ok());
        assert!(check_transition(&paid(Delivered), Shipped).is_err());
        assert!(check_transition(&paid(Cancelled), Refunded).is_err());
        assert!(check_transition(&paid(Refunded), Delivered).is_err());
    }

    #[test]
    fn refunds_need_a_payment() {
        let err = check_transition(&order(OrderStatusType::Processing, PaymentStatus::Pending), OrderStatusType::Refunded)
            .unwrap_err();
        assert_eq!(err, OrderApiError::NotPaid("ORD-1".into()));
    }

    #[test]
    fn new_order_validation() {
        use crate::db_types::NewOrderItem;
        let ok = NewOrder::new("A".into(), Cents::from(300)).with_item(NewOrderItem::new("p", 3, Cents::from(100)));
        assert!(validate_new_order(&ok).is_ok());
        let wrong_total = NewOrder::new("A".into(), Cents::from(200)).with_item(NewOrderItem::new("p", 3, Cents::from(100)));
        assert!(matches!(validate_new_order(&wrong_total), Err(OrderApiError::InvalidOrder(_))));
        let zero_qty = NewOrder::new("A".into(), Cents::from(0)).with_item(NewOrderItem::new("p", 0, Cents::from(100)));
        assert!(matches!(validate_new_order(&zero_qty), Err(OrderApiError::InvalidOrder(_))));
        let blank = NewOrder::new(" ".into(), Cents::from(0));
        assert!(validate_new_order(&blank).is_err());
    }

    #[test]
    fn negative_prices_are_rejected() {
        use crate::db_types::NewOrderItem;
        let refund_as_order =
            NewOrder::new("A".into(), Cents::from(0)).with_item(NewOrderItem::new("p", 1, Cents::from(-100)));
        let err = validate_new_order(&refund_as_order).unwrap_err();
        assert_eq!(err, OrderApiError::InvalidOrder("p has a negative price".into()));
        let negative_offer = NewOrder::new("A".into(), Cents::from(0))
            .with_item(NewOrderItem::new("p", 1, Cents::from(100)).with_discount(Cents::from(-100)));
        assert!(matches!(validate_new_order(&negative_offer), Err(OrderApiError::InvalidOrder(_))));
        let negative_fee = NewOrder::new("A".into(), Cents::from(0)).with_delivery("courier", Cents::from(-1));
        assert!(matches!(validate_new_order(&negative_fee), Err(OrderApiError::InvalidOrder(_))));
    }

    #[test]
    fn overflowing_totals_are_rejected() {
        use crate::db_types::NewOrderItem;
        let huge = NewOrder::new("A".into(), Cents::from(1))
            .with_item(NewOrderItem::new("p", 4_000_000_000, Cents::from(4_000_000_000_000)));
        let err = validate_new_order(&huge).unwrap_err();
        assert_eq!(err, OrderApiError::InvalidOrder("the order total is too large".into()));
        let fee = NewOrder::new("A".into(), Cents::from(1))
            .with_item(NewOrderItem::new("p", 1, Cents::from(i64::MAX)))
            .with_delivery("courier", Cents::from(1));
        assert!(matches!(validate_new_order(&fee), Err(OrderApiError::InvalidOrder(_))));
    }
}
