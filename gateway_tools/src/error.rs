use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("The payment gateway is not configured: {0}")]
    ConfigurationError(String),
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The gateway could not be reached: {0}")]
    UpstreamError(String),
    #[error("The gateway did not respond within {0} seconds")]
    Timeout(u64),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("The gateway response was not in the expected format: {0}")]
    MalformedResponse(String),
}

impl GatewayApiError {
    /// True if the failure lies with the gateway or the network rather than with our own configuration.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamError(_)
                | Self::Timeout(_)
                | Self::QueryError { .. }
                | Self::JsonError(_)
                | Self::MalformedResponse(_)
        )
    }
}
