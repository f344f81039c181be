use thiserror::Error;

use crate::db_types::{OrderId, OrderStatusType};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconciliationError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} is already linked to payment {existing}. Payment {attempted} cannot replace it.")]
    ReferenceConflict { order_id: OrderId, existing: String, attempted: String },
    #[error("Payment {reference} has already been recorded against an order other than {order_id}")]
    ReferenceInUse { order_id: OrderId, reference: String },
    #[error("Order {order_id} is {status} and can no longer accept a payment")]
    OrderNotPayable { order_id: OrderId, status: OrderStatusType },
    #[error("A payment reference is required to confirm a payment")]
    MissingReference,
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl ReconciliationError {
    /// Errors that will never resolve themselves, no matter how often the same signal is delivered.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, Self::DatabaseError(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderApiError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} already exists")]
    DuplicateOrder(OrderId),
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
    #[error("An order cannot move from {from} to {to}")]
    ForbiddenTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} has not been paid")]
    NotPaid(OrderId),
    #[error("Order {0} was modified by someone else. Reload it and try again.")]
    ConcurrentModification(OrderId),
    #[error("Database error: {0}")]
    DatabaseError(String),
}
