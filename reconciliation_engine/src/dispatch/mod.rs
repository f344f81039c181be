//! One-time side effects of a successful payment.
//!
//! Nothing in here may fail the reconciliation that triggered it. Every dispatcher reports a [`DispatchOutcome`] and
//! logs its own failures.
mod email;
mod mailer;

use std::fmt::Display;

pub use email::{resolve_recipient, ConfirmationEmail, EmailLine, EmailSettings};
use futures_util::join;
use log::*;
pub use mailer::{EmailError, EmailSender, HttpMailer, LogMailer, Mailer};
use serde::{Deserialize, Serialize};

use crate::{
    db::traits::{CartManagement, OrderManagement, ProductCatalog},
    db_types::Order,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Done,
    /// There was nothing to do, e.g. a guest order has no cart to clear.
    Skipped(String),
    Failed(String),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

impl Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Skipped(why) => write!(f, "skipped ({why})"),
            Self::Failed(why) => write!(f, "failed ({why})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectReport {
    pub cart: DispatchOutcome,
    pub email: DispatchOutcome,
}

impl SideEffectReport {
    pub fn all_succeeded(&self) -> bool {
        self.cart.is_success() && self.email.is_success()
    }
}

#[derive(Clone)]
pub struct SideEffectDispatcher<B, E> {
    db: B,
    mailer: E,
    settings: EmailSettings,
}

impl<B, E> SideEffectDispatcher<B, E> {
    pub fn new(db: B, mailer: E, settings: EmailSettings) -> Self {
        Self { db, mailer, settings }
    }

    pub fn with_settings(mut self, settings: EmailSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn mailer(&self) -> &E {
        &self.mailer
    }
}

impl<B, E> SideEffectDispatcher<B, E>
where
    B: CartManagement + OrderManagement + ProductCatalog,
    E: EmailSender,
{
    /// Runs every side effect for a freshly paid order. Both run to completion even if the other fails.
    pub async fn dispatch_all(&self, order: &Order, gateway_email: Option<&str>) -> SideEffectReport {
        let (cart, email) = join!(self.clear_cart(order), self.send_confirmation(order, gateway_email));
        let report = SideEffectReport { cart, email };
        if report.all_succeeded() {
            debug!("✉️ Side effects for order {}: cart {}, email {}", order.order_id, report.cart, report.email);
        } else {
            warn!("✉️ Side effects for order {}: cart {}, email {}", order.order_id, report.cart, report.email);
        }
        report
    }

    pub async fn clear_cart(&self, order: &Order) -> DispatchOutcome {
        let Some(user_id) = order.user_id.as_deref() else {
            trace!("✉️ Order {} is a guest order. There is no cart to clear.", order.order_id);
            return DispatchOutcome::Skipped("guest order".into());
        };
        match self.db.clear_cart_for_user(user_id).await {
            Ok(n) => {
                info!("✉️ Cleared {n} items from the cart of {user_id} after paying for order {}", order.order_id);
                DispatchOutcome::Done
            },
            Err(e) => {
                error!("✉️ Could not clear the cart of {user_id} for order {}. {e}", order.order_id);
                DispatchOutcome::Failed(e.to_string())
            },
        }
    }

    pub async fn send_confirmation(&self, order: &Order, gateway_email: Option<&str>) -> DispatchOutcome {
        let Some(to) = resolve_recipient(order, gateway_email) else {
            warn!("✉️ No usable email address for order {}. No confirmation will be sent.", order.order_id);
            return DispatchOutcome::Skipped("no recipient".into());
        };
        let email = match self.compose(order, to).await {
            Ok(email) => email,
            Err(e) => {
                error!("✉️ Could not compose the confirmation for order {}. {e}", order.order_id);
                return DispatchOutcome::Failed(e);
            },
        };
        match self.mailer.send(&email).await {
            Ok(()) => {
                info!("✉️ Confirmation for order {} sent to {}", order.order_id, email.to);
                DispatchOutcome::Done
            },
            Err(e) => {
                error!("✉️ Could not send the confirmation for order {} to {}. {e}", order.order_id, email.to);
                DispatchOutcome::Failed(e.to_string())
            },
        }
    }

    async fn compose(&self, order: &Order, to: String) -> Result<ConfirmationEmail, String> {
        let items = self.db.fetch_order_items(&order.order_id).await.map_err(|e| e.to_string())?;
        let ids = items.iter().map(|i| i.product_id.clone()).collect::<Vec<String>>();
        // A missing catalogue entry only costs us a product name, so lookup failures degrade to ids
        let products = self.db.fetch_product_summaries(&ids).await.unwrap_or_else(|e| {
            warn!("✉️ Product lookup failed for order {}. Falling back to product ids. {e}", order.order_id);
            vec![]
        });
        Ok(ConfirmationEmail::compose(order, &items, &products, to, &self.settings))
    }
}
