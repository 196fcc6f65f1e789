//! Order status derivation
//!
//! The stored ground truth of an order is its [`OrderPhase`] (the explicit
//! customer/staff actions) plus the status of every line. The customer-facing
//! [`OrderStatus`] is always computed from those by [`derive_status`]; it is
//! cached on the record for readers but never mutated on its own.

use super::types::{LineStatus, OrderLine};
use crate::lifecycle::Lifecycle;
use serde::{Deserialize, Serialize};

/// Explicit lifecycle step of an order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderPhase {
    #[default]
    Draft,
    Pending,
    Accepted,
    Rejected,
    SentToWaiter,
    Served,
}

/// 订单状态 (derived)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Draft,
    Pending,
    Accepted,
    Preparing,
    Ready,
    ReadyToService,
    Served,
    Cancelled,
}

impl Lifecycle for OrderStatus {
    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Draft => 0,
            OrderStatus::Pending => 1,
            OrderStatus::Accepted => 2,
            OrderStatus::Preparing => 3,
            OrderStatus::Ready => 4,
            OrderStatus::ReadyToService => 5,
            OrderStatus::Served => 6,
            OrderStatus::Cancelled => 7,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Served | OrderStatus::Cancelled)
    }

    fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::ReadyToService => "ready_to_service",
            OrderStatus::Served => "served",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl OrderStatus {
    /// Kitchen is (or may be) working on it
    pub fn is_in_kitchen(&self) -> bool {
        matches!(
            self,
            OrderStatus::Accepted | OrderStatus::Preparing | OrderStatus::Ready
        )
    }

    /// Parse a wire name (`"ready_to_service"`, ...)
    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure derivation: same phase and lines always give the same status.
///
/// 1. draft / pending / rejected map directly (rejected → cancelled)
/// 2. every line cancelled → cancelled
/// 3. served / sent_to_waiter map directly
/// 4. accepted: all live lines served → served; all live lines ready or
///    served with at least one ready → ready; any line started → preparing;
///    otherwise accepted
pub fn derive_status(phase: OrderPhase, lines: &[OrderLine]) -> OrderStatus {
    match phase {
        OrderPhase::Draft => return OrderStatus::Draft,
        OrderPhase::Rejected => return OrderStatus::Cancelled,
        _ => {}
    }

    let mut live = lines.iter().filter(|l| l.status.is_live()).peekable();
    if !lines.is_empty() && live.peek().is_none() {
        return OrderStatus::Cancelled;
    }

    match phase {
        OrderPhase::Pending => OrderStatus::Pending,
        OrderPhase::Served => OrderStatus::Served,
        OrderPhase::SentToWaiter => OrderStatus::ReadyToService,
        _ => {
            let live: Vec<LineStatus> = live.map(|l| l.status).collect();
            if live.is_empty() {
                return OrderStatus::Accepted;
            }
            if live.iter().all(|s| *s == LineStatus::Served) {
                OrderStatus::Served
            } else if live
                .iter()
                .all(|s| matches!(s, LineStatus::Ready | LineStatus::Served))
            {
                OrderStatus::Ready
            } else if live.iter().any(|s| *s != LineStatus::Queued) {
                OrderStatus::Preparing
            } else {
                OrderStatus::Accepted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(statuses: &[LineStatus]) -> Vec<OrderLine> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| OrderLine {
                line_id: format!("l{i}"),
                item_id: "x".into(),
                name_snapshot: "X".into(),
                unit_price_cents_snapshot: 100,
                modifiers: vec![],
                qty: 1,
                note: None,
                line_total_cents: 100,
                status: *status,
                started_at: None,
                ready_at: None,
                served_at: None,
                cancelled_at: None,
            })
            .collect()
    }

    #[test]
    fn test_direct_phases() {
        use LineStatus::*;
        let ls = lines(&[Queued]);
        assert_eq!(derive_status(OrderPhase::Draft, &ls), OrderStatus::Draft);
        assert_eq!(derive_status(OrderPhase::Pending, &ls), OrderStatus::Pending);
        assert_eq!(derive_status(OrderPhase::Rejected, &ls), OrderStatus::Cancelled);
        assert_eq!(
            derive_status(OrderPhase::SentToWaiter, &lines(&[Ready])),
            OrderStatus::ReadyToService
        );
        assert_eq!(
            derive_status(OrderPhase::Served, &lines(&[Served])),
            OrderStatus::Served
        );
    }

    #[test]
    fn test_accepted_progression() {
        use LineStatus::*;
        let phase = OrderPhase::Accepted;
        assert_eq!(derive_status(phase, &lines(&[Queued, Queued])), OrderStatus::Accepted);
        assert_eq!(derive_status(phase, &lines(&[Preparing, Queued])), OrderStatus::Preparing);
        assert_eq!(derive_status(phase, &lines(&[Ready, Queued])), OrderStatus::Preparing);
        assert_eq!(derive_status(phase, &lines(&[Ready, Ready])), OrderStatus::Ready);
        assert_eq!(derive_status(phase, &lines(&[Ready, Cancelled])), OrderStatus::Ready);
    }

    #[test]
    fn test_all_cancelled() {
        use LineStatus::*;
        assert_eq!(
            derive_status(OrderPhase::Accepted, &lines(&[Cancelled, Cancelled])),
            OrderStatus::Cancelled
        );
        assert_eq!(
            derive_status(OrderPhase::Pending, &lines(&[Cancelled])),
            OrderStatus::Cancelled
        );
        // an empty draft is still a draft
        assert_eq!(derive_status(OrderPhase::Draft, &[]), OrderStatus::Draft);
    }

    #[test]
    fn test_derivation_is_pure() {
        use LineStatus::*;
        let ls = lines(&[Preparing, Ready, Cancelled]);
        let first = derive_status(OrderPhase::Accepted, &ls);
        for _ in 0..10 {
            assert_eq!(derive_status(OrderPhase::Accepted, &ls), first);
        }
    }

    #[test]
    fn test_parse_wire_name() {
        assert_eq!(OrderStatus::parse("ready_to_service"), Some(OrderStatus::ReadyToService));
        assert_eq!(OrderStatus::parse("bogus"), None);
        assert_eq!(
            serde_json::to_string(&OrderStatus::ReadyToService).unwrap(),
            "\"ready_to_service\""
        );
    }
}
