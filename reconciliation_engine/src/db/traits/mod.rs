//! The behaviour a storage backend must provide to act as the order store.
//!
//! Each concern lives in its own trait so that callers (and test doubles) only need to implement what they use.
//! [`StorefrontDatabase`] ties them together for the APIs that need all of them.
mod cart_management;
mod order_management;
mod payment_reconciliation;
mod product_catalog;

pub use cart_management::CartManagement;
pub use order_management::{InsertOrderResult, OrderManagement, OrderQueryFilter};
pub use payment_reconciliation::{MarkPaidResult, PaymentReconciliation};
pub use product_catalog::ProductCatalog;

#[allow(async_fn_in_trait)]
pub trait StorefrontDatabase:
    Clone + OrderManagement + PaymentReconciliation + CartManagement + ProductCatalog
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the database connection pool.
    async fn close(&mut self) -> Result<(), <Self as OrderManagement>::Error>;
}
