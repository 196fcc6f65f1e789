//! Table session: the root of identity for a party's orders and bill

use crate::lifecycle::Lifecycle;
use serde::{Deserialize, Serialize};

/// 桌台会话状态
///
/// `OPEN < BILL_REQUESTED < PAYMENT_PENDING < PAID < CLOSED`; a cash payment
/// may jump `BILL_REQUESTED -> PAID` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Open,
    BillRequested,
    PaymentPending,
    Paid,
    Closed,
}

impl SessionStatus {
    /// Explicit edge table
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Open, BillRequested)
                | (BillRequested, PaymentPending)
                | (BillRequested, Paid)
                | (PaymentPending, Paid)
                | (Paid, Closed)
        )
    }

    /// Orders may be drafted and submitted only while the session is open
    pub fn accepts_orders(&self) -> bool {
        matches!(self, SessionStatus::Open)
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, SessionStatus::Closed)
    }
}

impl Lifecycle for SessionStatus {
    fn rank(&self) -> u8 {
        match self {
            SessionStatus::Open => 0,
            SessionStatus::BillRequested => 1,
            SessionStatus::PaymentPending => 2,
            SessionStatus::Paid => 3,
            SessionStatus::Closed => 4,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Closed)
    }

    fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "OPEN",
            SessionStatus::BillRequested => "BILL_REQUESTED",
            SessionStatus::PaymentPending => "PAYMENT_PENDING",
            SessionStatus::Paid => "PAID",
            SessionStatus::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 桌台会话
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub table_id: String,
    /// Denormalized at open time
    pub table_number_snapshot: String,
    /// Opaque generation value; clients key their stored draft order by it
    pub session_key: String,
    pub status: SessionStatus,
    pub opened_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_requested_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
    #[serde(default)]
    pub active_bill_id: Option<String>,
}

impl Session {
    /// Latest lifecycle stamp; the floor for the next one
    pub fn last_stamp(&self) -> i64 {
        [self.bill_requested_at, self.paid_at, self.closed_at]
            .into_iter()
            .flatten()
            .fold(self.opened_at, i64::max)
    }
}

/// Registered physical table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub table_id: String,
    pub table_number: String,
    /// QR token generation; rotated when a session closes
    #[serde(default = "default_epoch")]
    pub token_epoch: u64,
}

fn default_epoch() -> u64 {
    1
}
