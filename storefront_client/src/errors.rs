use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Request failed: {0}")]
    RequestError(String),
    #[error("The server responded with {status}. {message}")]
    ServerError { status: u16, message: String },
    #[error("Could not deserialize response: {0}")]
    JsonError(String),
    #[error("The change stream failed: {0}")]
    StreamError(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::JsonError(e.to_string())
        } else {
            Self::RequestError(e.to_string())
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidUrl(e.to_string())
    }
}
