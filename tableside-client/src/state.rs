//! Local view of one table: session, orders and bill
//!
//! Pushed events are applied as monotonic deltas. Every entity keeps the last
//! known status and an event only lands when [`Lifecycle::accepts`] the new
//! status, so a late `preparing` never overwrites a known `served`. Anything
//! the state cannot apply safely (unknown entity, backwards bill move, a
//! different session) asks the caller to re-fetch instead.

use std::collections::HashMap;

use shared::Lifecycle;
use shared::bill::{ActiveBillView, Bill, BillStatus};
use shared::message::{BusMessage, RealtimeEvent};
use shared::order::{Order, OrderStatus};
use shared::session::{Session, SessionStatus};

/// What to reload from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refetch {
    Order(String),
    Bill,
    Session,
    /// Session, orders and bill
    All,
}

/// Outcome of applying one pushed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconcile {
    Applied,
    /// Stale, duplicate or about another table
    Ignored,
    NeedsRefetch(Refetch),
}

/// Cached state for one table
#[derive(Debug, Clone, Default)]
pub struct LocalState {
    table_id: Option<String>,
    session: Option<Session>,
    /// Submitted orders (and the current draft) of the tracked session
    orders: HashMap<String, Order>,
    bill: Option<Bill>,
    /// Highest sequence seen on the socket
    last_sequence: u64,
}

impl LocalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only messages for `table_id` are considered
    pub fn for_table(table_id: impl Into<String>) -> Self {
        Self {
            table_id: Some(table_id.into()),
            ..Self::default()
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// Orders sorted by creation time
    pub fn orders(&self) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self.orders.values().collect();
        orders.sort_by_key(|o| (o.created_at, o.order_id.clone()));
        orders
    }

    pub fn bill(&self) -> Option<&Bill> {
        self.bill.as_ref()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    // ========== Cold load ==========

    /// Replace the session. A different session id drops everything cached
    /// for the previous one.
    pub fn replace_session(&mut self, session: Option<Session>) {
        let changed = match (&self.session, &session) {
            (Some(old), Some(new)) => old.session_id != new.session_id,
            (Some(_), None) => true,
            _ => false,
        };
        if changed {
            self.orders.clear();
            self.bill = None;
        }
        self.session = session;
    }

    pub fn replace_orders(&mut self, orders: Vec<Order>) {
        self.orders = orders
            .into_iter()
            .filter(|o| self.belongs_to_session(&o.session_id))
            .map(|o| (o.order_id.clone(), o))
            .collect();
    }

    pub fn upsert_order(&mut self, order: Order) {
        if self.belongs_to_session(&order.session_id) {
            self.orders.insert(order.order_id.clone(), order);
        }
    }

    pub fn replace_bill(&mut self, bill: Option<Bill>) {
        self.bill = bill;
    }

    pub fn replace_bill_view(&mut self, view: ActiveBillView) {
        if let Some(session) = &mut self.session
            && session.session_id == view.session_id
        {
            session.active_bill_id = Some(view.bill.bill_id.clone());
        }
        self.bill = Some(view.bill);
    }

    pub fn clear(&mut self) {
        self.session = None;
        self.orders.clear();
        self.bill = None;
    }

    fn belongs_to_session(&self, session_id: &str) -> bool {
        self.session
            .as_ref()
            .is_none_or(|s| s.session_id == session_id)
    }

    // ========== Realtime deltas ==========

    /// Apply one pushed message
    pub fn apply(&mut self, msg: &BusMessage) -> Reconcile {
        if let Some(table_id) = &self.table_id
            && *table_id != msg.table_id
        {
            return Reconcile::Ignored;
        }
        self.last_sequence = self.last_sequence.max(msg.sequence);

        // 会话不一致 (翻台) 时整体重拉
        match &self.session {
            Some(session) if session.session_id != msg.session_id => {
                return match &msg.event {
                    // late event from an earlier session
                    RealtimeEvent::SessionClosed { .. } => Reconcile::Ignored,
                    _ => Reconcile::NeedsRefetch(Refetch::All),
                };
            }
            None => return Reconcile::NeedsRefetch(Refetch::All),
            Some(_) => {}
        }

        match &msg.event {
            RealtimeEvent::SessionOpened { status, .. } => self.apply_session_status(*status),
            RealtimeEvent::SessionClosed {
                status, closed_at, ..
            } => {
                let result = self.apply_session_status(*status);
                if let (Reconcile::Applied, Some(session)) = (&result, &mut self.session) {
                    session.closed_at.get_or_insert(*closed_at);
                }
                result
            }

            // Draft content is not in the payload
            RealtimeEvent::OrderUpdated { order_id, .. } => {
                Reconcile::NeedsRefetch(Refetch::Order(order_id.clone()))
            }
            RealtimeEvent::OrderSubmitted {
                order_id,
                status,
                total_cents,
                submitted_at,
            } => match self.orders.get_mut(order_id) {
                // only the draft is known; its lines may have changed since
                Some(order) if order.items.is_empty() => {
                    Reconcile::NeedsRefetch(Refetch::Order(order_id.clone()))
                }
                Some(order) => {
                    if !order.status.accepts(status) {
                        return Reconcile::Ignored;
                    }
                    order.status = *status;
                    order.total_cents = *total_cents;
                    order.subtotal_cents = *total_cents;
                    order.submitted_at.get_or_insert(*submitted_at);
                    Reconcile::Applied
                }
                None => Reconcile::NeedsRefetch(Refetch::Order(order_id.clone())),
            },
            RealtimeEvent::OrderAccepted { order_id } => {
                self.apply_order_status(order_id, OrderStatus::Accepted)
            }
            RealtimeEvent::OrderStatusChanged { order_id, status } => {
                self.apply_order_status(order_id, *status)
            }
            RealtimeEvent::OrderReadyToServe { order_id, .. } => {
                self.apply_order_status(order_id, OrderStatus::ReadyToService)
            }
            RealtimeEvent::OrderLineStatusChanged {
                order_id,
                line_id,
                status,
                order_status,
            } => {
                let Some(order) = self.orders.get_mut(order_id) else {
                    return Reconcile::NeedsRefetch(Refetch::Order(order_id.clone()));
                };
                let Some(line) = order.items.iter_mut().find(|l| l.line_id == *line_id) else {
                    return Reconcile::NeedsRefetch(Refetch::Order(order_id.clone()));
                };
                if !line.status.accepts(status) {
                    return Reconcile::Ignored;
                }
                let was_live = line.status.is_live();
                line.status = *status;
                if was_live && !status.is_live() {
                    // cancelled lines leave the total
                    order.subtotal_cents -= line.line_total_cents;
                    order.total_cents = order.subtotal_cents;
                }
                if let Some(order_status) = order_status
                    && order.status.accepts(order_status)
                {
                    order.status = *order_status;
                }
                Reconcile::Applied
            }

            RealtimeEvent::BillRequested {
                bill_id,
                status,
                total_cents,
            } => {
                let result = self.apply_bill(bill_id, *status, |bill| {
                    bill.total_cents = *total_cents;
                });
                if result == Reconcile::Applied {
                    self.apply_session_status(SessionStatus::BillRequested);
                }
                result
            }
            RealtimeEvent::BillPaymentPending {
                bill_id, status, ..
            } => {
                let result = self.apply_bill(bill_id, *status, |_| {});
                if result == Reconcile::Applied {
                    self.apply_session_status(SessionStatus::PaymentPending);
                }
                result
            }
            // The one legitimate backwards bill move: never patched in place
            RealtimeEvent::BillPaymentFailed { .. } => Reconcile::NeedsRefetch(Refetch::Bill),
            RealtimeEvent::BillPaid {
                bill_id,
                status,
                method,
                paid_at,
                total_cents,
            } => {
                let result = self.apply_bill(bill_id, *status, |bill| {
                    bill.method = Some(*method);
                    bill.paid_at = Some(*paid_at);
                    bill.total_cents = *total_cents;
                });
                if result == Reconcile::Applied {
                    self.apply_session_status(SessionStatus::Paid);
                    if let Some(session) = &mut self.session {
                        session.paid_at.get_or_insert(*paid_at);
                    }
                }
                result
            }
        }
    }

    fn apply_session_status(&mut self, status: SessionStatus) -> Reconcile {
        let Some(session) = &mut self.session else {
            return Reconcile::NeedsRefetch(Refetch::Session);
        };
        if session.status == status || !session.status.accepts(&status) {
            return Reconcile::Ignored;
        }
        session.status = status;
        Reconcile::Applied
    }

    fn apply_order_status(&mut self, order_id: &str, status: OrderStatus) -> Reconcile {
        let Some(order) = self.orders.get_mut(order_id) else {
            return Reconcile::NeedsRefetch(Refetch::Order(order_id.to_string()));
        };
        if order.status == status || !order.status.accepts(&status) {
            return Reconcile::Ignored;
        }
        order.status = status;
        Reconcile::Applied
    }

    fn apply_bill(
        &mut self,
        bill_id: &str,
        status: BillStatus,
        patch: impl FnOnce(&mut Bill),
    ) -> Reconcile {
        let Some(bill) = self.bill.as_mut().filter(|b| b.bill_id == bill_id) else {
            return Reconcile::NeedsRefetch(Refetch::Bill);
        };
        if !bill.status.accepts(&status) {
            return Reconcile::Ignored;
        }
        bill.status = status;
        patch(bill);
        Reconcile::Applied
    }
}
