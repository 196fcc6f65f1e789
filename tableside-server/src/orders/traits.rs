//! Command handler contract
//!
//! Every command is turned into a [`CommandAction`](super::actions::CommandAction)
//! that runs against a [`CommandContext`] bound to one redb write transaction.
//! Actions validate against the stored state, save the aggregates they
//! change and stage realtime events; the manager commits and publishes.

use enum_dispatch::enum_dispatch;
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};
use shared::bill::{Bill, Payment};
use shared::message::RealtimeEvent;
use shared::order::Order;
use shared::session::{Session, TableInfo};
use shared::staff::StaffRole;
use shared::util::monotonic_stamp;
use thiserror::Error;

use super::storage::{DiningStorage, StorageError, StoreRead};
use crate::auth::TableTokenService;
use crate::catalog::CatalogProvider;
use crate::payments::PaymentGateways;

/// Action errors
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid table token for table {0}")]
    InvalidTableToken(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {session_id} is {status}, not OPEN")]
    SessionNotOpen { session_id: String, status: String },

    #[error("{0}")]
    SessionMismatch(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Line {line_id} not found in order {order_id}")]
    LineNotFound { order_id: String, line_id: String },

    #[error("Cannot {action} {entity} in state {from}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    #[error("Order {0} has no items")]
    EmptyOrder(String),

    #[error("{0}")]
    ItemUnavailable(String),

    #[error("{0}")]
    Validation(String),

    #[error("Bill not found: {0}")]
    BillNotFound(String),

    #[error("Bill already paid: {0}")]
    BillAlreadyPaid(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: i64, actual: i64 },

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl OrderError {
    pub fn transition(entity: &'static str, from: impl ToString, action: &'static str) -> Self {
        OrderError::InvalidTransition {
            entity,
            from: from.to_string(),
            action,
        }
    }
}

/// Who issued a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    /// Customer device holding a valid table token
    Customer { table_id: String },
    /// Authenticated staff member
    Staff { id: String, role: StaffRole },
    /// Payment webhook / IPN
    Gateway,
    /// Background kitchen simulator
    AutoCook,
    /// Startup seeding
    System,
}

impl Actor {
    pub fn label(&self) -> String {
        match self {
            Actor::Customer { table_id } => format!("customer@{table_id}"),
            Actor::Staff { id, role } => format!("{role}:{id}"),
            Actor::Gateway => "gateway".to_string(),
            Actor::AutoCook => "auto-cook".to_string(),
            Actor::System => "system".to_string(),
        }
    }

    /// Customers may only touch aggregates of their own table
    pub fn ensure_table(&self, table_id: &str) -> Result<(), OrderError> {
        match self {
            Actor::Customer { table_id: own } if own != table_id => {
                Err(OrderError::SessionMismatch(format!(
                    "Resource belongs to table {table_id}, not {own}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Command metadata
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    pub command_id: String,
    pub actor: Actor,
    pub timestamp: i64,
}

/// Collaborators an action may consult
pub struct CommandServices<'a> {
    pub catalog: &'a dyn CatalogProvider,
    pub table_tokens: &'a TableTokenService,
    pub gateways: &'a PaymentGateways,
}

/// Event staged for publication after commit
#[derive(Debug, Clone)]
pub struct StagedEvent {
    pub sequence: u64,
    pub table_id: String,
    pub session_id: String,
    pub event: RealtimeEvent,
}

/// Command execution context bound to one write transaction
pub struct CommandContext<'a> {
    txn: &'a WriteTransaction,
    storage: &'a DiningStorage,
    services: CommandServices<'a>,
    sequence: u64,
    events: Vec<StagedEvent>,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        txn: &'a WriteTransaction,
        storage: &'a DiningStorage,
        services: CommandServices<'a>,
        current_sequence: u64,
    ) -> Self {
        Self {
            txn,
            storage,
            services,
            sequence: current_sequence,
            events: Vec::new(),
        }
    }

    pub fn services(&self) -> &CommandServices<'a> {
        &self.services
    }

    /// Allocate the next global sequence number
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    pub fn current_sequence(&self) -> u64 {
        self.sequence
    }

    /// Stage an event; it is published only if the transaction commits
    pub fn emit(&mut self, table_id: &str, session_id: &str, event: RealtimeEvent) {
        let sequence = self.next_sequence();
        self.events.push(StagedEvent {
            sequence,
            table_id: table_id.to_string(),
            session_id: session_id.to_string(),
            event,
        });
    }

    pub fn take_events(&mut self) -> Vec<StagedEvent> {
        std::mem::take(&mut self.events)
    }

    /// Transaction view for ad-hoc reads
    pub fn reader(&self) -> &WriteTransaction {
        self.txn
    }

    // ========== Loads ==========

    pub fn load_table(&self, table_id: &str) -> Result<TableInfo, OrderError> {
        self.txn
            .get_table(table_id)?
            .ok_or_else(|| OrderError::TableNotFound(table_id.to_string()))
    }

    /// Validate a customer token against the table's current epoch
    pub fn authorize_table(&self, table_id: &str, token: &str) -> Result<TableInfo, OrderError> {
        let table = self.load_table(table_id)?;
        if !self
            .services
            .table_tokens
            .verify(&table.table_id, table.token_epoch, token)
        {
            return Err(OrderError::InvalidTableToken(table_id.to_string()));
        }
        Ok(table)
    }

    pub fn load_session(&self, session_id: &str) -> Result<Session, OrderError> {
        self.txn
            .get_session(session_id)?
            .ok_or_else(|| OrderError::SessionNotFound(session_id.to_string()))
    }

    pub fn active_session(&self, table_id: &str) -> Result<Option<Session>, OrderError> {
        Ok(self.txn.active_session_for_table(table_id)?)
    }

    pub fn load_order(&self, order_id: &str) -> Result<Order, OrderError> {
        self.txn
            .get_order(order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))
    }

    pub fn session_orders(&self, session_id: &str) -> Result<Vec<Order>, OrderError> {
        Ok(self.txn.session_orders(session_id)?)
    }

    pub fn draft_order_id(&self, session_id: &str) -> Result<Option<String>, OrderError> {
        Ok(self.txn.draft_order_id(session_id)?)
    }

    pub fn load_bill(&self, bill_id: &str) -> Result<Bill, OrderError> {
        self.txn
            .get_bill(bill_id)?
            .ok_or_else(|| OrderError::BillNotFound(bill_id.to_string()))
    }

    pub fn load_payment(&self, payment_id: &str) -> Result<Payment, OrderError> {
        self.txn
            .get_payment(payment_id)?
            .ok_or_else(|| OrderError::PaymentNotFound(payment_id.to_string()))
    }

    pub fn bill_payments(&self, bill_id: &str) -> Result<Vec<Payment>, OrderError> {
        Ok(self.txn.bill_payments(bill_id)?)
    }

    // ========== Saves ==========

    pub fn save_table(&self, table: &TableInfo) -> Result<(), OrderError> {
        Ok(self.storage.store_table(self.txn, table)?)
    }

    pub fn save_session(&self, session: &Session) -> Result<(), OrderError> {
        Ok(self.storage.store_session(self.txn, session)?)
    }

    pub fn set_active_session(&self, session: &Session) -> Result<(), OrderError> {
        Ok(self
            .storage
            .set_active_session(self.txn, &session.table_id, &session.session_id)?)
    }

    pub fn clear_active_session(&self, table_id: &str) -> Result<(), OrderError> {
        Ok(self.storage.clear_active_session(self.txn, table_id)?)
    }

    /// Recompute derived fields, stamp `updated_at` and persist
    pub fn save_order(&self, order: &mut Order, now: i64) -> Result<(), OrderError> {
        order.refresh();
        order.updated_at = monotonic_stamp(Some(order.updated_at), now);
        Ok(self.storage.store_order(self.txn, order)?)
    }

    /// Index a new order under its session
    pub fn index_order(&mut self, order: &Order) -> Result<(), OrderError> {
        let sequence = self.next_sequence();
        Ok(self
            .storage
            .index_session_order(self.txn, &order.session_id, sequence, &order.order_id)?)
    }

    pub fn set_draft_order(&self, session_id: &str, order_id: &str) -> Result<(), OrderError> {
        Ok(self.storage.set_draft_order(self.txn, session_id, order_id)?)
    }

    pub fn clear_draft_order(&self, session_id: &str) -> Result<(), OrderError> {
        Ok(self.storage.clear_draft_order(self.txn, session_id)?)
    }

    pub fn save_bill(&self, bill: &Bill) -> Result<(), OrderError> {
        Ok(self.storage.store_bill(self.txn, bill)?)
    }

    pub fn save_payment(&self, payment: &Payment) -> Result<(), OrderError> {
        Ok(self.storage.store_payment(self.txn, payment)?)
    }
}

/// Command handler trait
///
/// Implementations validate against the state read through `ctx`, persist
/// their changes through `ctx` and stage events with `ctx.emit`. Returning
/// an error aborts the whole transaction.
#[enum_dispatch]
pub trait CommandHandler {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<crate::orders::command::CommandReply, OrderError>;
}
