use crate::db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatusType, PaymentStatus, TrackingInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOrderResult {
    Inserted(Order),
    AlreadyExists(Order),
}

/// The `OrderManagement` trait defines the behaviour for creating, querying and updating orders in the database
/// backend. It deliberately has no way to change an order's payment state; see
/// [`PaymentReconciliation`](super::PaymentReconciliation) for that.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    type Error: std::error::Error;

    /// Stores a new order and its line items atomically. If an order with the same `order_id` already exists, nothing
    /// is written and the existing order is returned.
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, Self::Error>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, Self::Error>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, Self::Error>;

    /// Moves an order from `from` to `to`, but only if its status is still `from`. Returns the updated order, or
    /// `None` if the order was not in the expected state (or does not exist).
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
        tracking: Option<TrackingInfo>,
    ) -> Result<Option<Order>, Self::Error>;
}

#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub user_id: Option<String>,
    pub payment_reference: Option<String>,
    pub statuses: Vec<OrderStatusType>,
    pub payment_statuses: Vec<PaymentStatus>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_payment_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_statuses.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.user_id.is_none() &&
            self.payment_reference.is_none() &&
            self.statuses.is_empty() &&
            self.payment_statuses.is_empty()
    }
}
