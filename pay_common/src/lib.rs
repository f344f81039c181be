mod cents;
mod helpers;
mod outcome;

pub mod op;
mod secret;

pub use cents::{Cents, CentsConversionError};
pub use helpers::parse_boolean_flag;
pub use outcome::PaymentOutcome;
pub use secret::Secret;
