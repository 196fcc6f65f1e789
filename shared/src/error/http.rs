//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::OrderLineNotFound
            | Self::BillNotFound
            | Self::PaymentNotFound
            | Self::TableNotFound
            | Self::SessionNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict (stale view, client re-fetches)
            Self::AlreadyExists
            | Self::IdempotencyKeyReused
            | Self::InvalidTransition
            | Self::SessionNotOpen
            | Self::SessionMismatch
            | Self::BillAlreadyPaid => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated
            | Self::InvalidCredentials
            | Self::TokenExpired
            | Self::TokenInvalid
            | Self::InvalidTableToken
            | Self::PaymentSignatureInvalid => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            Self::PermissionDenied | Self::RoleRequired => StatusCode::FORBIDDEN,

            // 422 Unprocessable
            Self::EmptyOrder | Self::ItemUnavailable | Self::AmountMismatch => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            // 202 Accepted: the payment is in flight
            Self::ConfirmationPending => StatusCode::ACCEPTED,

            // 502 Bad Gateway
            Self::GatewayError => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::NetworkError | Self::TimeoutError => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError
            | Self::ClientDisconnected => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
