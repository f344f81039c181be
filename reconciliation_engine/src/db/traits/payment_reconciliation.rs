use crate::db_types::{Order, OrderId, OrderStatusType};

/// What happened when we tried to record a payment against an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkPaidResult {
    /// This call changed the order. Exactly one call per order ever sees this result.
    Transitioned(Order),
    /// The order was already paid with the same reference. Nothing was written.
    AlreadyPaid(Order),
    /// The order already carries a different reference. Nothing was written.
    ReferenceConflict { order: Order, existing_reference: String },
    /// The reference has already been recorded against another order. Nothing was written.
    ReferenceInUse(Order),
    /// The order is unpaid but has left `pending` (cancelled, for instance). Nothing was written.
    NotPayable(Order),
}

#[allow(async_fn_in_trait)]
pub trait PaymentReconciliation {
    type Error: std::error::Error;

    /// Atomically marks the order as paid with the given reference, if and only if it is not paid yet and does not
    /// carry a different reference. The check and the write must happen in a single conditional statement so that
    /// concurrent callers cannot both succeed.
    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        reference: &str,
        paid_status: OrderStatusType,
    ) -> Result<Option<MarkPaidResult>, Self::Error>;
}
