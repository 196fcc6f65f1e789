use super::super::storage::StorageError;
use super::super::traits::OrderError;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Idempotency key {0} was already used for a different request")]
    CommandReused(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ManagerResult<T> = Result<T, ManagerError>;

/// 存储错误 → 错误码
fn classify_storage_error(e: &StorageError) -> AppError {
    match e {
        StorageError::Serialization(_) => AppError::internal(e.to_string()),
        _ => AppError::database(e.to_string()),
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::TableNotFound(id) => {
                AppError::with_message(ErrorCode::TableNotFound, format!("Table not found: {id}"))
                    .with_detail("tableId", id)
            }
            OrderError::InvalidTableToken(id) => {
                AppError::invalid_table_token().with_detail("tableId", id)
            }
            OrderError::SessionNotFound(id) => AppError::with_message(
                ErrorCode::SessionNotFound,
                format!("Session not found: {id}"),
            )
            .with_detail("sessionId", id),
            ref e @ OrderError::SessionNotOpen {
                ref session_id,
                ref status,
            } => AppError::with_message(ErrorCode::SessionNotOpen, e.to_string())
                .with_detail("sessionId", session_id.clone())
                .with_detail("status", status.clone()),
            OrderError::SessionMismatch(msg) => {
                AppError::with_message(ErrorCode::SessionMismatch, msg)
            }
            OrderError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, format!("Order not found: {id}"))
                    .with_detail("orderId", id)
            }
            ref e @ OrderError::LineNotFound {
                ref order_id,
                ref line_id,
            } => AppError::with_message(ErrorCode::OrderLineNotFound, e.to_string())
                .with_detail("orderId", order_id.clone())
                .with_detail("lineId", line_id.clone()),
            OrderError::InvalidTransition {
                entity,
                from,
                action,
            } => AppError::invalid_transition(entity, from, action),
            OrderError::EmptyOrder(id) => AppError::with_message(
                ErrorCode::EmptyOrder,
                format!("Order {id} has no items"),
            )
            .with_detail("orderId", id),
            OrderError::ItemUnavailable(msg) => {
                AppError::with_message(ErrorCode::ItemUnavailable, msg)
            }
            OrderError::Validation(msg) => AppError::validation(msg),
            OrderError::BillNotFound(id) => {
                AppError::with_message(ErrorCode::BillNotFound, format!("Bill not found: {id}"))
                    .with_detail("billId", id)
            }
            OrderError::BillAlreadyPaid(id) => AppError::with_message(
                ErrorCode::BillAlreadyPaid,
                format!("Bill already paid: {id}"),
            )
            .with_detail("billId", id),
            OrderError::PaymentNotFound(id) => AppError::with_message(
                ErrorCode::PaymentNotFound,
                format!("Payment not found: {id}"),
            )
            .with_detail("paymentId", id),
            ref e @ OrderError::AmountMismatch {
                ref expected,
                ref actual,
            } => AppError::with_message(ErrorCode::AmountMismatch, e.to_string())
                .with_detail("expected", *expected)
                .with_detail("actual", *actual),
            OrderError::Gateway(msg) => AppError::with_message(ErrorCode::GatewayError, msg),
            OrderError::Storage(e) => classify_storage_error(&e),
        }
    }
}

impl From<ManagerError> for AppError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::Storage(e) => classify_storage_error(&e),
            ManagerError::Order(e) => e.into(),
            ManagerError::CommandReused(id) => AppError::with_message(
                ErrorCode::IdempotencyKeyReused,
                format!("Idempotency key {id} was already used for a different request"),
            ),
            ManagerError::Internal(msg) => AppError::internal(msg),
        }
    }
}
