use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FulfillmentError>;

#[derive(Error, Debug)]
pub enum FulfillmentError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid receipt: {0}")]
    InvalidReceipt(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Transaction is pending: {0}")]
    Pending(String),

    #[error("Mismatched user: caller {caller} is not redeemer {redeemer}")]
    MismatchedUser { caller: String, redeemer: String },

    #[error("No redemption codes available for contract {contract}, offer {offer}, token {token}")]
    NoCodesAvailable {
        contract: String,
        offer: String,
        token: String,
    },

    #[error("Unable to redeem contract {contract}, offer {offer}, token {token}; retry later")]
    UnableToRedeem {
        contract: String,
        offer: String,
        token: String,
    },

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for FulfillmentError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                FulfillmentError::ServiceUnavailable("database connection pool exhausted".to_string())
            }
            sqlx::Error::PoolClosed => {
                FulfillmentError::ServiceUnavailable("database connection pool closed".to_string())
            }
            other => FulfillmentError::Database(other),
        }
    }
}

// RPC endpoints often embed API keys in their URL, so the URL never leaves this process.
impl From<reqwest::Error> for FulfillmentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FulfillmentError::Rpc("request timed out".to_string());
        }
        FulfillmentError::Rpc(err.without_url().to_string())
    }
}

impl From<validator::ValidationErrors> for FulfillmentError {
    fn from(err: validator::ValidationErrors) -> Self {
        FulfillmentError::InvalidInput(err.to_string())
    }
}

impl From<config::ConfigError> for FulfillmentError {
    fn from(err: config::ConfigError) -> Self {
        FulfillmentError::Config(err.to_string())
    }
}

impl ResponseError for FulfillmentError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        match self {
            FulfillmentError::Database(e) => {
                tracing::error!(error = ?e, "Database error while handling request");
            }
            FulfillmentError::Internal(e) => {
                tracing::error!(error = %e, "Internal error while handling request");
            }
            _ => {}
        }

        let error_message = match self {
            FulfillmentError::Database(_) => "Database error".to_string(),
            other => other.to_string(),
        };

        let mut response = HttpResponse::build(status_code);
        if self.is_retryable() {
            response.insert_header(("Retry-After", "1"));
        }

        response.json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            FulfillmentError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FulfillmentError::UnknownNetwork(_) => StatusCode::NOT_FOUND,
            FulfillmentError::NotFound(_) => StatusCode::NOT_FOUND,
            FulfillmentError::InvalidReceipt(_) => StatusCode::BAD_REQUEST,
            FulfillmentError::Decode(_) => StatusCode::BAD_REQUEST,
            FulfillmentError::Pending(_) => StatusCode::CONFLICT,
            FulfillmentError::MismatchedUser { .. } => StatusCode::FORBIDDEN,
            FulfillmentError::NoCodesAvailable { .. } => StatusCode::GONE,
            FulfillmentError::UnableToRedeem { .. } => StatusCode::CONFLICT,
            FulfillmentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FulfillmentError::Rpc(_) => StatusCode::BAD_GATEWAY,
            FulfillmentError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            FulfillmentError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            FulfillmentError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FulfillmentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl FulfillmentError {
    pub fn error_type(&self) -> &'static str {
        match self {
            FulfillmentError::InvalidInput(_) => "invalid_input",
            FulfillmentError::UnknownNetwork(_) => "unknown_network",
            FulfillmentError::NotFound(_) => "not_found",
            FulfillmentError::InvalidReceipt(_) => "invalid_receipt",
            FulfillmentError::Decode(_) => "decode_error",
            FulfillmentError::Pending(_) => "pending",
            FulfillmentError::MismatchedUser { .. } => "mismatched_user",
            FulfillmentError::NoCodesAvailable { .. } => "no_codes_available",
            FulfillmentError::UnableToRedeem { .. } => "unable_to_redeem",
            FulfillmentError::Database(_) => "database_error",
            FulfillmentError::Rpc(_) => "rpc_error",
            FulfillmentError::ServiceUnavailable(_) => "service_unavailable",
            FulfillmentError::Unauthorized(_) => "unauthorized",
            FulfillmentError::Config(_) => "configuration_error",
            FulfillmentError::Internal(_) => "internal_error",
        }
    }

    /// Whether the same request may succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FulfillmentError::UnableToRedeem { .. }
                | FulfillmentError::Database(_)
                | FulfillmentError::Rpc(_)
                | FulfillmentError::ServiceUnavailable(_)
        )
    }
}
