//! Bill and payment types

use crate::lifecycle::Lifecycle;
use serde::{Deserialize, Serialize};

/// 账单状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    #[default]
    Requested,
    PaymentPending,
    Paid,
    /// Representable for completeness; no operation produces it
    Cancelled,
}

impl BillStatus {
    /// Explicit edge table. `PAYMENT_PENDING -> REQUESTED` is the one
    /// legitimate backwards step (a failed online attempt).
    pub fn can_transition_to(&self, next: BillStatus) -> bool {
        use BillStatus::*;
        matches!(
            (self, next),
            (Requested, PaymentPending)
                | (Requested, Paid)
                | (PaymentPending, Paid)
                | (PaymentPending, Requested)
                | (Requested, Cancelled)
                | (PaymentPending, Cancelled)
        )
    }

    /// A payment may still be taken
    pub fn is_payable(&self) -> bool {
        matches!(self, BillStatus::Requested | BillStatus::PaymentPending)
    }
}

impl Lifecycle for BillStatus {
    fn rank(&self) -> u8 {
        match self {
            BillStatus::Requested => 0,
            BillStatus::PaymentPending => 1,
            BillStatus::Paid => 2,
            BillStatus::Cancelled => 3,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, BillStatus::Paid | BillStatus::Cancelled)
    }

    fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Requested => "REQUESTED",
            BillStatus::PaymentPending => "PAYMENT_PENDING",
            BillStatus::Paid => "PAID",
            BillStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 支付方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Online,
}

/// 账单
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub bill_id: String,
    pub session_id: String,
    pub table_id: String,
    pub table_number_snapshot: String,
    pub status: BillStatus,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
    /// Live Σ served lines while unpaid; frozen once `PAID`
    pub total_cents: i64,
    pub requested_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Orders with at least one served line, by reference
    #[serde(default)]
    pub order_ids: Vec<String>,
}

/// Served line as shown on the bill
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServedLine {
    pub order_id: String,
    pub line_id: String,
    pub name_snapshot: String,
    pub qty: u32,
    pub line_total_cents: i64,
}

/// Customer bill view, read from one consistent snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveBillView {
    pub session_id: String,
    pub session_key: String,
    pub table_number: String,
    pub bill: Bill,
    pub served_lines: Vec<ServedLine>,
}

// ============================================================================
// Payments
// ============================================================================

/// Gateway adapter that created a payment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    Mock,
    SignedRedirect,
}

impl std::str::FromStr for PaymentProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(PaymentProvider::Mock),
            "signed_redirect" | "vnpay" => Ok(PaymentProvider::SignedRedirect),
            other => Err(format!("unknown payment provider: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// Online payment attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub payment_id: String,
    pub bill_id: String,
    pub provider: PaymentProvider,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub checkout_url: String,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

/// Gateway outcome delivered by a webhook / IPN
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success,
    Failure,
}

/// Response of `createOnlinePayment`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub payment_id: String,
    pub bill_id: String,
    pub amount_cents: i64,
    pub checkout_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bill_edges() {
        use BillStatus::*;
        assert!(Requested.can_transition_to(Paid));
        assert!(Requested.can_transition_to(PaymentPending));
        assert!(PaymentPending.can_transition_to(Requested));
        assert!(PaymentPending.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Requested));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Requested));
    }

    #[test]
    fn test_failed_attempt_is_a_regression_for_clients() {
        // clients cannot apply it as a delta and must re-fetch
        assert!(!BillStatus::PaymentPending.accepts(&BillStatus::Requested));
        assert!(BillStatus::Requested.accepts(&BillStatus::Paid));
        assert!(!BillStatus::Paid.accepts(&BillStatus::PaymentPending));
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("mock".parse::<PaymentProvider>(), Ok(PaymentProvider::Mock));
        assert_eq!(
            "VNPAY".parse::<PaymentProvider>(),
            Ok(PaymentProvider::SignedRedirect)
        );
        assert!("stripe".parse::<PaymentProvider>().is_err());
    }

    #[test]
    fn test_bill_wire_shape() {
        let bill = Bill {
            bill_id: "b1".into(),
            session_id: "s1".into(),
            table_id: "t1".into(),
            table_number_snapshot: "4".into(),
            status: BillStatus::PaymentPending,
            method: None,
            total_cents: 12000,
            requested_at: 5,
            paid_at: None,
            cancelled_at: None,
            note: Some("split later".into()),
            order_ids: vec!["o1".into()],
        };
        let value = serde_json::to_value(&bill).unwrap();
        assert_eq!(value["status"], "PAYMENT_PENDING");
        assert_eq!(value["method"], serde_json::Value::Null);
        assert_eq!(value["totalCents"], 12000);
        assert!(value.get("paidAt").is_none());
    }
}
