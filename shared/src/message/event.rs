//! Realtime event catalog
//!
//! A closed set of tagged events. On the wire each event is
//! `{"event": "<name>", "data": {...}}`; receivers match exhaustively.

use crate::bill::{BillStatus, PaymentMethod};
use crate::order::{LineStatus, OrderStatus};
use crate::session::SessionStatus;
use crate::staff::StaffRole;
use serde::{Deserialize, Serialize};

/// 实时推送事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum RealtimeEvent {
    // ========== Session ==========
    #[serde(rename = "session.opened")]
    SessionOpened {
        session_id: String,
        session_key: String,
        status: SessionStatus,
    },
    #[serde(rename = "session.closed")]
    SessionClosed {
        session_id: String,
        status: SessionStatus,
        closed_at: i64,
    },

    // ========== Order ==========
    /// Draft content changed; receivers reload the order
    #[serde(rename = "order.updated")]
    OrderUpdated {
        order_id: String,
        status: OrderStatus,
        total_cents: i64,
    },
    #[serde(rename = "order.submitted")]
    OrderSubmitted {
        order_id: String,
        status: OrderStatus,
        total_cents: i64,
        submitted_at: i64,
    },
    #[serde(rename = "order.accepted")]
    OrderAccepted { order_id: String },
    #[serde(rename = "order.status_changed")]
    OrderStatusChanged {
        order_id: String,
        status: OrderStatus,
    },
    #[serde(rename = "order.line_status_changed")]
    OrderLineStatusChanged {
        order_id: String,
        line_id: String,
        status: LineStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_status: Option<OrderStatus>,
    },
    #[serde(rename = "order.ready_to_serve")]
    OrderReadyToServe {
        order_id: String,
        table_number: String,
    },

    // ========== Bill ==========
    #[serde(rename = "bill.requested")]
    BillRequested {
        bill_id: String,
        status: BillStatus,
        total_cents: i64,
    },
    #[serde(rename = "bill.payment_pending")]
    BillPaymentPending {
        bill_id: String,
        payment_id: String,
        status: BillStatus,
    },
    #[serde(rename = "bill.payment_failed")]
    BillPaymentFailed {
        bill_id: String,
        payment_id: String,
        status: BillStatus,
    },
    #[serde(rename = "bill.paid")]
    BillPaid {
        bill_id: String,
        status: BillStatus,
        method: PaymentMethod,
        paid_at: i64,
        total_cents: i64,
    },
}

impl RealtimeEvent {
    /// Wire name (`"order.submitted"`, ...)
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::SessionOpened { .. } => "session.opened",
            RealtimeEvent::SessionClosed { .. } => "session.closed",
            RealtimeEvent::OrderUpdated { .. } => "order.updated",
            RealtimeEvent::OrderSubmitted { .. } => "order.submitted",
            RealtimeEvent::OrderAccepted { .. } => "order.accepted",
            RealtimeEvent::OrderStatusChanged { .. } => "order.status_changed",
            RealtimeEvent::OrderLineStatusChanged { .. } => "order.line_status_changed",
            RealtimeEvent::OrderReadyToServe { .. } => "order.ready_to_serve",
            RealtimeEvent::BillRequested { .. } => "bill.requested",
            RealtimeEvent::BillPaymentPending { .. } => "bill.payment_pending",
            RealtimeEvent::BillPaymentFailed { .. } => "bill.payment_failed",
            RealtimeEvent::BillPaid { .. } => "bill.paid",
        }
    }

    /// Order the event is about, if any
    pub fn order_id(&self) -> Option<&str> {
        match self {
            RealtimeEvent::OrderUpdated { order_id, .. }
            | RealtimeEvent::OrderSubmitted { order_id, .. }
            | RealtimeEvent::OrderAccepted { order_id }
            | RealtimeEvent::OrderStatusChanged { order_id, .. }
            | RealtimeEvent::OrderLineStatusChanged { order_id, .. }
            | RealtimeEvent::OrderReadyToServe { order_id, .. } => Some(order_id),
            _ => None,
        }
    }

    /// Bill the event is about, if any
    pub fn bill_id(&self) -> Option<&str> {
        match self {
            RealtimeEvent::BillRequested { bill_id, .. }
            | RealtimeEvent::BillPaymentPending { bill_id, .. }
            | RealtimeEvent::BillPaymentFailed { bill_id, .. }
            | RealtimeEvent::BillPaid { bill_id, .. } => Some(bill_id),
            _ => None,
        }
    }

    /// Staff channels that receive this event (admin receives everything).
    ///
    /// Draft edits stay on the table channel; the kitchen only sees submitted
    /// order traffic.
    pub fn staff_audience(&self) -> &'static [StaffRole] {
        match self {
            RealtimeEvent::OrderUpdated { .. } => &[StaffRole::Admin],
            RealtimeEvent::OrderSubmitted { .. }
            | RealtimeEvent::OrderAccepted { .. }
            | RealtimeEvent::OrderStatusChanged { .. }
            | RealtimeEvent::OrderLineStatusChanged { .. }
            | RealtimeEvent::OrderReadyToServe { .. } => {
                &[StaffRole::Kitchen, StaffRole::Waiter, StaffRole::Admin]
            }
            RealtimeEvent::SessionOpened { .. }
            | RealtimeEvent::SessionClosed { .. }
            | RealtimeEvent::BillRequested { .. }
            | RealtimeEvent::BillPaymentPending { .. }
            | RealtimeEvent::BillPaymentFailed { .. }
            | RealtimeEvent::BillPaid { .. } => &[StaffRole::Waiter, StaffRole::Admin],
        }
    }
}
