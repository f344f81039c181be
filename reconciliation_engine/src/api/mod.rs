pub mod errors;
pub mod order_api;
pub mod order_objects;
pub mod reconciliation_api;
