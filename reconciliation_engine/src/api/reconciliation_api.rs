use std::fmt::Debug;

use log::*;

use crate::{
    api::{
        errors::ReconciliationError,
        order_objects::{ConfirmationResult, PaymentConfirmation},
    },
    db::traits::{MarkPaidResult, OrderManagement, PaymentReconciliation, StorefrontDatabase},
    db_types::{Order, OrderStatusType},
    dispatch::{EmailSender, EmailSettings, SideEffectDispatcher},
    events::{ConfirmationSource, EventProducers, OrderModifiedEvent, OrderPaidEvent},
};

/// `ReconciliationApi` brings the order store in line with what the payment gateway says happened.
///
/// The verification path and the webhook path both end up in [`Self::confirm_payment`], in any order and any number
/// of times. Exactly one of those calls moves the order to paid, and only that call runs the side effects.
pub struct ReconciliationApi<B, E> {
    db: B,
    dispatcher: SideEffectDispatcher<B, E>,
    producers: EventProducers,
    paid_status: OrderStatusType,
}

impl<B, E> Debug for ReconciliationApi<B, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi (paid orders move to {})", self.paid_status)
    }
}

impl<B: Clone, E> ReconciliationApi<B, E> {
    pub fn new(db: B, mailer: E, producers: EventProducers) -> Self {
        let dispatcher = SideEffectDispatcher::new(db.clone(), mailer, EmailSettings::default());
        Self { db, dispatcher, producers, paid_status: OrderStatusType::Processing }
    }

    pub fn with_email_settings(self, settings: EmailSettings) -> Self {
        let Self { db, dispatcher, producers, paid_status } = self;
        let dispatcher = dispatcher.with_settings(settings);
        Self { db, dispatcher, producers, paid_status }
    }

    /// Sets the status a freshly paid order is placed in. Every path must agree on this, so it is fixed for the
    /// lifetime of the API. Only `processing` and `confirmed` are accepted.
    pub fn with_paid_status(mut self, status: OrderStatusType) -> Self {
        if status.is_paid_entry_status() {
            self.paid_status = status;
        } else {
            warn!("🔄️ {status} is not a valid status for a newly paid order. Keeping {}", self.paid_status);
        }
        self
    }

    pub fn paid_status(&self) -> OrderStatusType {
        self.paid_status
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn mailer(&self) -> &E {
        self.dispatcher.mailer()
    }
}

impl<B, E> ReconciliationApi<B, E>
where
    B: StorefrontDatabase,
    E: EmailSender,
{
    /// Records a payment outcome against an order.
    ///
    /// * A non-success outcome changes nothing.
    /// * An order already paid with the same reference changes nothing, and no side effects run.
    /// * An order carrying a different reference is rejected with [`ReconciliationError::ReferenceConflict`]. The
    ///   reference is write-once.
    /// * An unpaid order that has left `pending` is rejected with [`ReconciliationError::OrderNotPayable`].
    /// * Otherwise the order is marked as paid in one conditional write. The caller whose write lands runs the cart
    ///   and email side effects, whose failures are reported in the result but never returned as errors.
    pub async fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<ConfirmationResult, ReconciliationError> {
        let PaymentConfirmation { order_id, reference, outcome, customer_email, source } = confirmation;
        if !outcome.is_success() {
            info!("🔄️ Payment {reference} for order {order_id} has outcome {outcome}. Nothing to do.");
            return Ok(ConfirmationResult::NotSuccessful { outcome });
        }
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ReconciliationError::MissingReference);
        }
        let order = OrderManagement::fetch_order_by_order_id(&self.db, &order_id)
            .await
            .map_err(|e| ReconciliationError::DatabaseError(e.to_string()))?
            .ok_or_else(|| ReconciliationError::OrderNotFound(order_id.clone()))?;
        match order.payment_reference.as_deref() {
            Some(existing) if existing == reference && order.is_paid() => {
                debug!("🔄️ Order {order_id} is already paid with {reference}. Nothing to do.");
                return Ok(ConfirmationResult::AlreadyPaid { order });
            },
            Some(existing) if existing != reference => {
                return Err(self.reference_conflict(&order, existing, reference));
            },
            _ => {},
        }
        let result = self
            .db
            .mark_order_paid(&order_id, reference, self.paid_status)
            .await
            .map_err(|e| ReconciliationError::DatabaseError(e.to_string()))?
            .ok_or_else(|| ReconciliationError::OrderNotFound(order_id.clone()))?;
        match result {
            MarkPaidResult::Transitioned(paid_order) => {
                info!(
                    "🔄️✅️ Order {order_id} is paid ({} via {source:?}, reference {reference}). Status is now {}",
                    paid_order.total_amount, paid_order.status
                );
                self.call_order_paid_hooks(&order, &paid_order, source).await;
                let side_effects = self.dispatcher.dispatch_all(&paid_order, customer_email.as_deref()).await;
                Ok(ConfirmationResult::Transitioned { order: paid_order, side_effects })
            },
            MarkPaidResult::AlreadyPaid(order) => {
                debug!("🔄️ Order {order_id} was paid with {reference} by a concurrent caller. Nothing to do.");
                Ok(ConfirmationResult::AlreadyPaid { order })
            },
            MarkPaidResult::ReferenceConflict { order, existing_reference } => {
                Err(self.reference_conflict(&order, &existing_reference, reference))
            },
            MarkPaidResult::ReferenceInUse(_) => {
                error!("🔄️❌️ Payment {reference} already belongs to another order and cannot be applied to {order_id}");
                Err(ReconciliationError::ReferenceInUse { order_id, reference: reference.to_string() })
            },
            MarkPaidResult::NotPayable(order) => {
                error!(
                    "🔄️❌️ Payment {reference} arrived for order {order_id}, which is {}. The order was left untouched \
                     and the payment needs manual attention.",
                    order.status
                );
                Err(ReconciliationError::OrderNotPayable { order_id, status: order.status })
            },
        }
    }

    fn reference_conflict(&self, order: &Order, existing: &str, attempted: &str) -> ReconciliationError {
        error!(
            "🔄️❌️ Order {} already carries payment {existing}. A second payment {attempted} was reported for it and \
             needs manual attention.",
            order.order_id
        );
        ReconciliationError::ReferenceConflict {
            order_id: order.order_id.clone(),
            existing: existing.to_string(),
            attempted: attempted.to_string(),
        }
    }

    async fn call_order_paid_hooks(&self, old_order: &Order, paid_order: &Order, source: ConfirmationSource) {
        for emitter in &self.producers.order_paid_producer {
            debug!("🔄️ Notifying order paid hook subscribers");
            emitter.publish_event(OrderPaidEvent::new(paid_order.clone(), source)).await;
        }
        for emitter in &self.producers.order_modified_producer {
            emitter.publish_event(OrderModifiedEvent::new(old_order.clone(), paid_order.clone())).await;
        }
    }
}
