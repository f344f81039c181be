//! Storefront Reconciliation Engine
//!
//! This library holds the logic that turns "the gateway says this payment succeeded" into a paid order, exactly once,
//! no matter how many times or through how many channels that news arrives.
//!
//! The library is divided into the following sections:
//! 1. The order store ([`mod@db`]). Storage backends implement the traits in [`db::traits`]. SQLite is the only
//!    backend currently provided. The data types that are persisted live in [`db_types`] and are public.
//! 2. The public API ([`mod@api`]). [`ReconciliationApi`] confirms payments and [`OrderApi`] handles order creation
//!    and the fulfilment lifecycle. Callers should go through these rather than touching the database directly.
//! 3. Side effects ([`mod@dispatch`]). Clearing the buyer's cart and sending the confirmation email happen once per
//!    order, after the paid transition has been committed. Their failure never undoes a payment.
//!
//! The engine also emits events ([`mod@events`]) whenever an order is paid or modified. Hooks can subscribe to these
//! to push live updates to clients.
pub mod api;
pub mod db;
pub mod db_types;
pub mod dispatch;
pub mod events;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;
#[cfg(any(feature = "test_utils", test))]
pub use test_utils::MemoryMailer;

pub use api::{
    errors::{OrderApiError, ReconciliationError},
    order_api::OrderApi,
    order_objects,
    reconciliation_api::ReconciliationApi,
};
#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    CartManagement,
    InsertOrderResult,
    MarkPaidResult,
    OrderManagement,
    OrderQueryFilter,
    PaymentReconciliation,
    ProductCatalog,
    StorefrontDatabase,
};
pub use dispatch::{
    DispatchOutcome,
    EmailError,
    EmailSender,
    EmailSettings,
    Mailer,
    SideEffectDispatcher,
    SideEffectReport,
};
