//! A client for the storefront server.
//!
//! [`StorefrontClient`] wraps the HTTP endpoints a checkout page needs: the verify call made after the gateway
//! redirect, the order read endpoint and the order change stream. [`StatusNotifier`] combines the change stream with
//! an adaptive polling loop to track an order until it reaches a final state.
mod client;
mod errors;
mod notifier;
mod sse;

pub use client::{RedirectOutcome, StorefrontClient};
pub use errors::ClientError;
pub use notifier::{apply_update, is_terminal, poll_interval, OrderChangeFeed, OrderStatusSource, StatusNotifier};
pub use sse::{SseEvent, SseParser};
