//! Unified error codes for Tableside
//!
//! Error codes are shared by the server, the client library and any frontend.
//! They are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 5xxx: Bill / payment errors
//! - 7xxx: Table / session errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,
    /// Idempotency key reused with a different request body
    IdempotencyKeyReused = 9,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Invalid credentials
    InvalidCredentials = 1002,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Specific role required
    RoleRequired = 2002,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order line not found
    OrderLineNotFound = 4002,
    /// State transition not allowed from the current state
    InvalidTransition = 4003,
    /// Order has no lines
    EmptyOrder = 4004,
    /// Catalog item unknown or unavailable
    ItemUnavailable = 4005,

    // ==================== 5xxx: Bill / Payment ====================
    /// Bill not found
    BillNotFound = 5001,
    /// Bill has already been paid
    BillAlreadyPaid = 5002,
    /// Payment not found
    PaymentNotFound = 5003,
    /// Payment amount does not match the bill total
    AmountMismatch = 5004,
    /// Payment confirmation has not arrived yet
    ConfirmationPending = 5005,
    /// Gateway signature did not verify
    PaymentSignatureInvalid = 5006,
    /// Payment gateway failure
    GatewayError = 5007,

    // ==================== 7xxx: Table / Session ====================
    /// Table not found
    TableNotFound = 7001,
    /// Table QR token is invalid or stale
    InvalidTableToken = 7002,
    /// Session not found
    SessionNotFound = 7003,
    /// Session is not open for this operation
    SessionNotOpen = 7004,
    /// Entity does not belong to the caller's session
    SessionMismatch = 7005,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timeout
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
    /// Client disconnected
    ClientDisconnected = 9301,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// State conflicts: the caller acted on a stale view and should re-fetch
    /// the affected aggregate instead of surfacing the error.
    pub const fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidTransition
                | ErrorCode::SessionNotOpen
                | ErrorCode::SessionMismatch
                | ErrorCode::BillAlreadyPaid
        )
    }

    /// The table credential is no longer usable; the guest has to scan again.
    pub const fn requires_rescan(&self) -> bool {
        matches!(self, ErrorCode::InvalidTableToken | ErrorCode::TableNotFound)
    }

    /// Transient failures that may succeed when retried.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError | ErrorCode::TimeoutError | ErrorCode::ConfirmationPending
        )
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",
            ErrorCode::IdempotencyKeyReused => "Idempotency key was used for a different request",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::InvalidCredentials => "Invalid credentials",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "Specific role is required",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderLineNotFound => "Order line not found",
            ErrorCode::InvalidTransition => "Transition is not allowed from the current state",
            ErrorCode::EmptyOrder => "Order has no items",
            ErrorCode::ItemUnavailable => "Menu item is unknown or unavailable",

            // Payment
            ErrorCode::BillNotFound => "Bill not found",
            ErrorCode::BillAlreadyPaid => "Bill has already been paid",
            ErrorCode::PaymentNotFound => "Payment not found",
            ErrorCode::AmountMismatch => "Payment amount does not match the bill total",
            ErrorCode::ConfirmationPending => "Payment confirmation is still pending",
            ErrorCode::PaymentSignatureInvalid => "Payment signature is invalid",
            ErrorCode::GatewayError => "Payment gateway error",

            // Table / Session
            ErrorCode::TableNotFound => "Table not found",
            ErrorCode::InvalidTableToken => "Table QR code is invalid or expired",
            ErrorCode::SessionNotFound => "Session not found",
            ErrorCode::SessionNotOpen => "Session is not open",
            ErrorCode::SessionMismatch => "Resource belongs to a different session",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::ClientDisconnected => "Client disconnected",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),
            9 => Ok(ErrorCode::IdempotencyKeyReused),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::InvalidCredentials),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::RoleRequired),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderLineNotFound),
            4003 => Ok(ErrorCode::InvalidTransition),
            4004 => Ok(ErrorCode::EmptyOrder),
            4005 => Ok(ErrorCode::ItemUnavailable),

            // Payment
            5001 => Ok(ErrorCode::BillNotFound),
            5002 => Ok(ErrorCode::BillAlreadyPaid),
            5003 => Ok(ErrorCode::PaymentNotFound),
            5004 => Ok(ErrorCode::AmountMismatch),
            5005 => Ok(ErrorCode::ConfirmationPending),
            5006 => Ok(ErrorCode::PaymentSignatureInvalid),
            5007 => Ok(ErrorCode::GatewayError),

            // Table / Session
            7001 => Ok(ErrorCode::TableNotFound),
            7002 => Ok(ErrorCode::InvalidTableToken),
            7003 => Ok(ErrorCode::SessionNotFound),
            7004 => Ok(ErrorCode::SessionNotOpen),
            7005 => Ok(ErrorCode::SessionMismatch),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),
            9301 => Ok(ErrorCode::ClientDisconnected),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
