//! Client error types

use shared::error::ErrorCode;
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error envelope
    #[error("API error {code}: {message}")]
    Api {
        code: ErrorCode,
        message: String,
        status: u16,
    },

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client has no credentials for this call
    #[error("Credentials required: {0}")]
    MissingCredentials(&'static str),

    /// Online payment not confirmed before the poll deadline
    #[error("Payment confirmation is still pending")]
    ConfirmationPending,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Wire error code, when the failure carries one
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api { code, .. } => Some(*code),
            ClientError::ConfirmationPending => Some(ErrorCode::ConfirmationPending),
            ClientError::Http(e) if e.is_timeout() => Some(ErrorCode::TimeoutError),
            ClientError::Http(_) | ClientError::WebSocket(_) => Some(ErrorCode::NetworkError),
            _ => None,
        }
    }

    /// Local view is stale: re-fetch the aggregate silently instead of
    /// surfacing the error
    pub fn needs_refetch(&self) -> bool {
        matches!(
            self.code(),
            Some(
                ErrorCode::InvalidTransition
                    | ErrorCode::SessionNotOpen
                    | ErrorCode::SessionMismatch
                    | ErrorCode::BillAlreadyPaid
            )
        )
    }

    /// The scanned QR code is dead; the customer has to scan again
    pub fn needs_rescan(&self) -> bool {
        matches!(
            self.code(),
            Some(ErrorCode::InvalidTableToken | ErrorCode::TableNotFound)
        )
    }

    /// Staff credential expired; mutating calls are not retried
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self.code(),
            Some(ErrorCode::TokenExpired | ErrorCode::TokenInvalid | ErrorCode::NotAuthenticated)
        )
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
