//! Input validation helpers
//!
//! Text limits for customer-entered notes and cart bounds.

use crate::orders::traits::OrderError;

// ── Limits ──────────────────────────────────────────────────────────

/// Line notes, order notes, bill notes
pub const MAX_NOTE_LEN: usize = 500;

/// Per-line quantity upper bound (lower bound is 1)
pub const MAX_LINE_QTY: u32 = 99;

/// Lines per draft order
pub const MAX_DRAFT_LINES: usize = 100;

/// Idempotency-Key header
pub const MAX_COMMAND_ID_LEN: usize = 128;

// ── Helpers ─────────────────────────────────────────────────────────

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), OrderError> {
    if let Some(v) = value
        && v.chars().count() > max_len
    {
        return Err(OrderError::Validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.chars().count()
        )));
    }
    Ok(())
}

/// Trim an optional note; blank becomes `None`
pub fn normalize_note(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
