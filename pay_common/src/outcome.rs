use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The three outcomes the rest of the storefront cares about. Every gateway status string collapses into one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Failure,
    Pending,
}

impl PaymentOutcome {
    pub fn from_gateway_status(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "failed" | "abandoned" | "reversed" => Self::Failure,
            _ => Self::Pending,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Pending => write!(f, "pending"),
        }
    }
}
