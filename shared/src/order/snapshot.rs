//! Order record
//!
//! `status`, `line_total_cents`, `subtotal_cents` and `total_cents` are
//! caches. [`Order::refresh`] recomputes all of them from the phase and the
//! line inputs; every save goes through it, and [`Order::verify_derived`]
//! lets readers detect a stored record whose caches drifted.

use super::status::{OrderPhase, OrderStatus, derive_status};
use super::types::{LineStatus, OrderLine};
use serde::{Deserialize, Serialize};

/// 订单
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub session_id: String,
    pub table_id: String,
    pub table_number_snapshot: String,
    pub phase: OrderPhase,
    /// Derived from `phase` + line statuses
    pub status: OrderStatus,
    /// Insertion order is preserved
    pub items: Vec<OrderLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_note: Option<String>,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<i64>,
    pub updated_at: i64,
}

impl Order {
    /// Empty draft for a session
    pub fn new_draft(
        order_id: String,
        session_id: String,
        table_id: String,
        table_number_snapshot: String,
        now: i64,
    ) -> Self {
        Self {
            order_id,
            session_id,
            table_id,
            table_number_snapshot,
            phase: OrderPhase::Draft,
            status: OrderStatus::Draft,
            items: Vec::new(),
            order_note: None,
            subtotal_cents: 0,
            total_cents: 0,
            created_at: now,
            submitted_at: None,
            updated_at: now,
        }
    }

    /// Recompute every derived field.
    pub fn refresh(&mut self) {
        for line in &mut self.items {
            line.line_total_cents = line.compute_total();
        }
        self.subtotal_cents = self
            .items
            .iter()
            .filter(|l| l.status.is_live())
            .map(|l| l.line_total_cents)
            .sum();
        // no taxes or discounts
        self.total_cents = self.subtotal_cents;
        self.status = derive_status(self.phase, &self.items);
    }

    /// Do the cached fields match a fresh recomputation?
    pub fn verify_derived(&self) -> bool {
        let mut fresh = self.clone();
        fresh.refresh();
        fresh == *self
    }

    pub fn line(&self, line_id: &str) -> Option<&OrderLine> {
        self.items.iter().find(|l| l.line_id == line_id)
    }

    pub fn line_mut(&mut self, line_id: &str) -> Option<&mut OrderLine> {
        self.items.iter_mut().find(|l| l.line_id == line_id)
    }

    pub fn live_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.items.iter().filter(|l| l.status.is_live())
    }

    pub fn served_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.items.iter().filter(|l| l.status == LineStatus::Served)
    }

    /// Σ line totals over served lines
    pub fn served_total_cents(&self) -> i64 {
        self.served_lines().map(|l| l.line_total_cents).sum()
    }

    /// Every live line is still queued (nothing has reached the kitchen line)
    pub fn untouched_by_kitchen(&self) -> bool {
        self.live_lines().all(|l| l.status == LineStatus::Queued)
    }
}
