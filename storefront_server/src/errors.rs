use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use gateway_tools::GatewayApiError;
use reconciliation_engine::{OrderApiError, ReconciliationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Webhook signature is invalid or missing.")]
    SignatureError,
    #[error("Malformed gateway event. {0}")]
    MalformedEvent(String),
    #[error("The payment gateway could not be reached. {0}")]
    UpstreamError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state of the order. {0}")]
    Conflict(String),
    #[error("Requests from this address are not accepted.")]
    ForbiddenPeer,
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::MalformedEvent(_) => StatusCode::BAD_REQUEST,
            Self::SignatureError => StatusCode::UNAUTHORIZED,
            Self::ForbiddenPeer => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<GatewayApiError> for ServerError {
    fn from(e: GatewayApiError) -> Self {
        match e {
            GatewayApiError::ConfigurationError(_) | GatewayApiError::Initialization(_) => {
                Self::ConfigurationError(e.to_string())
            },
            e => Self::UpstreamError(e.to_string()),
        }
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            ReconciliationError::ReferenceConflict { .. } |
            ReconciliationError::ReferenceInUse { .. } |
            ReconciliationError::OrderNotPayable { .. } => {
                Self::Conflict(e.to_string())
            },
            ReconciliationError::MissingReference => Self::InvalidRequestBody(e.to_string()),
            ReconciliationError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<OrderApiError> for ServerError {
    fn from(e: OrderApiError) -> Self {
        match e {
            OrderApiError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderApiError::DuplicateOrder(_) |
            OrderApiError::ForbiddenTransition { .. } |
            OrderApiError::NotPaid(_) |
            OrderApiError::ConcurrentModification(_) => Self::Conflict(e.to_string()),
            OrderApiError::InvalidOrder(_) => Self::InvalidRequestBody(e.to_string()),
            OrderApiError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}
