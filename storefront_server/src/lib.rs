//! # Storefront payment server
//! This crate hosts the HTTP side of storefront payment confirmation. It is responsible for:
//! * Verifying a payment with the gateway when the customer is redirected back to the store.
//! * Receiving the gateway's signed payment webhooks.
//! * Handing both to the reconciliation engine, which settles each order exactly once.
//! * Serving orders, and a live stream of changes to them, to the storefront client.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `GET /api/payments/verify?reference=`: The verify-on-redirect call.
//! * `POST /gateway/webhook`: Gateway webhooks. Signature checked, and optionally IP whitelisted.
//! * `POST /api/orders`: Creates a pending order.
//! * `GET /api/orders/{order_id}`: The order and its items.
//! * `GET /api/orders/{order_id}/events`: Server-sent `order_changed` events for the order.
//! * `PATCH /api/orders/{order_id}/status`: Fulfilment status updates.
pub mod broadcaster;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
