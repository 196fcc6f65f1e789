//! DiningManager - command processing and realtime event generation
//!
//! # Command Flow
//!
//! ```text
//! execute(cmd)
//!     ├─ 1. Idempotency check (command_id, read snapshot)
//!     ├─ 2. Begin write transaction
//!     ├─ 3. Idempotency check again (another writer may have won)
//!     ├─ 4. Create CommandContext
//!     ├─ 5. Convert payload to action and execute
//!     ├─ 6. Persist sequence + command record
//!     ├─ 7. Commit transaction
//!     ├─ 8. Publish staged events
//!     └─ 9. Return reply
//! ```
//!
//! Reads run on one redb read transaction each, so a view (bill + served
//! lines, order list) never mixes states from two commits.

mod error;
pub use error::*;

use super::actions::CommandAction;
use super::billing;
use super::command::{CommandPayload, CommandReply, DiningCommand};
use super::storage::{DiningStorage, ProcessedCommand, StorageError, StoreRead};
use super::traits::{
    Actor, CommandContext, CommandHandler, CommandMetadata, CommandServices, OrderError,
};
use crate::auth::TableTokenService;
use crate::catalog::CatalogProvider;
use crate::message::MessageBus;
use crate::payments::PaymentGateways;
use sha2::{Digest, Sha256};
use shared::bill::{ActiveBillView, Bill, BillStatus, Payment};
use shared::dto::BillTab;
use shared::message::BusMessage;
use shared::order::{Order, OrderPhase, OrderStatus};
use shared::session::{Session, SessionStatus, TableInfo};
use std::sync::Arc;

/// DiningManager
///
/// The `epoch` field is a unique identifier generated on each startup.
/// Realtime clients receive it in the `hello` frame to detect restarts.
pub struct DiningManager {
    storage: DiningStorage,
    bus: MessageBus,
    /// Server instance epoch - unique ID generated on startup
    epoch: String,
    catalog: Arc<dyn CatalogProvider>,
    table_tokens: Arc<TableTokenService>,
    gateways: Arc<PaymentGateways>,
}

impl std::fmt::Debug for DiningManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiningManager")
            .field("storage", &"<DiningStorage>")
            .field("bus", &"<MessageBus>")
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl DiningManager {
    pub fn new(
        storage: DiningStorage,
        bus: MessageBus,
        catalog: Arc<dyn CatalogProvider>,
        table_tokens: Arc<TableTokenService>,
        gateways: Arc<PaymentGateways>,
    ) -> Self {
        let epoch = uuid::Uuid::new_v4().to_string();
        tracing::info!(epoch = %epoch, "DiningManager started with new epoch");
        Self {
            storage,
            bus,
            epoch,
            catalog,
            table_tokens,
            gateways,
        }
    }

    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    pub fn storage(&self) -> &DiningStorage {
        &self.storage
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn gateways(&self) -> &PaymentGateways {
        &self.gateways
    }

    /// Last committed global sequence
    pub fn current_sequence(&self) -> ManagerResult<u64> {
        Ok(self.storage.get_current_sequence()?)
    }

    // ========== Commands ==========

    /// Execute a command atomically and publish its events after commit
    pub fn execute(&self, cmd: DiningCommand) -> ManagerResult<CommandReply> {
        let command_name = cmd.payload.name();
        let fingerprint = fingerprint(&cmd.actor, &cmd.payload)?;

        // 1. Idempotency check on a snapshot
        if let Some(reply) = replay(&self.storage.begin_read()?, &cmd.command_id, &fingerprint)? {
            return Ok(reply);
        }

        // 2. Begin write transaction
        let txn = self.storage.begin_write()?;

        // 3. Re-check inside the transaction
        if let Some(reply) = replay(&txn, &cmd.command_id, &fingerprint)? {
            return Ok(reply);
        }

        // 4. Context
        let current_sequence = txn.current_sequence()?;
        let services = CommandServices {
            catalog: self.catalog.as_ref(),
            table_tokens: &self.table_tokens,
            gateways: &self.gateways,
        };
        let mut ctx = CommandContext::new(&txn, &self.storage, services, current_sequence);
        let metadata = CommandMetadata {
            command_id: cmd.command_id.clone(),
            actor: cmd.actor.clone(),
            timestamp: cmd.timestamp,
        };

        // 5. Execute
        let action = CommandAction::from(&cmd.payload);
        let reply = match action.execute(&mut ctx, &metadata) {
            Ok(reply) => reply,
            Err(e) => {
                // txn dropped here = aborted
                tracing::debug!(
                    command = command_name,
                    command_id = %cmd.command_id,
                    actor = %cmd.actor.label(),
                    error = %e,
                    "Command rejected"
                );
                return Err(e.into());
            }
        };
        let events = ctx.take_events();
        let last_sequence = ctx.current_sequence();

        // 6. Persist sequence + command record
        if last_sequence != current_sequence {
            self.storage.set_sequence(&txn, last_sequence)?;
        }
        if cmd.keyed {
            let record = ProcessedCommand {
                fingerprint,
                reply: serde_json::to_value(&reply)
                    .map_err(|e| ManagerError::Internal(format!("Cannot record reply: {e}")))?,
                recorded_at: shared::util::now_millis(),
            };
            self.storage.record_command(&txn, &cmd.command_id, &record)?;
        }

        // 7. Commit
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            command = command_name,
            command_id = %cmd.command_id,
            actor = %cmd.actor.label(),
            events = events.len(),
            sequence = last_sequence,
            "Command processed"
        );

        // 8. Publish
        for staged in events {
            self.bus.publish(BusMessage::new(
                staged.sequence,
                staged.table_id,
                staged.session_id,
                staged.event,
            ));
        }

        Ok(reply)
    }

    /// Drop idempotency records older than `older_than` (epoch millis)
    pub fn prune_command_records(&self, older_than: i64) -> ManagerResult<usize> {
        let txn = self.storage.begin_write()?;
        let removed = self.storage.prune_command_records(&txn, older_than)?;
        txn.commit().map_err(StorageError::from)?;
        if removed > 0 {
            tracing::info!(removed, older_than, "Pruned idempotency records");
        }
        Ok(removed)
    }

    // ========== Customer reads ==========

    /// Check a table token against the table's current epoch
    pub fn authorize_table(&self, table_id: &str, token: &str) -> ManagerResult<TableInfo> {
        let txn = self.storage.begin_read()?;
        let table = txn
            .get_table(table_id)?
            .ok_or_else(|| OrderError::TableNotFound(table_id.to_string()))?;
        if !self
            .table_tokens
            .verify(&table.table_id, table.token_epoch, token)
        {
            return Err(OrderError::InvalidTableToken(table_id.to_string()).into());
        }
        Ok(table)
    }

    pub fn active_session(&self, table_id: &str) -> ManagerResult<Option<Session>> {
        Ok(self.storage.begin_read()?.active_session_for_table(table_id)?)
    }

    /// An order of the table's active session
    pub fn get_order_for_table(&self, table_id: &str, order_id: &str) -> ManagerResult<Order> {
        let txn = self.storage.begin_read()?;
        let order = txn
            .get_order(order_id)?
            .filter(|o| o.table_id == table_id)
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        let active = txn.active_session_id(table_id)?;
        if active.as_deref() != Some(order.session_id.as_str()) {
            return Err(OrderError::SessionMismatch(format!(
                "Order {order_id} is not part of the table's current session"
            ))
            .into());
        }
        Ok(checked(order))
    }

    /// Submitted orders of the table's active session, creation order
    pub fn list_session_orders(&self, table_id: &str) -> ManagerResult<Vec<Order>> {
        let txn = self.storage.begin_read()?;
        let Some(session_id) = txn.active_session_id(table_id)? else {
            return Ok(Vec::new());
        };
        Ok(txn
            .session_orders(&session_id)?
            .into_iter()
            .filter(|o| o.phase != OrderPhase::Draft)
            .map(checked)
            .collect())
    }

    /// Bill view of the table's active session
    pub fn active_bill_view(&self, table_id: &str) -> ManagerResult<ActiveBillView> {
        let txn = self.storage.begin_read()?;
        let session = txn
            .active_session_for_table(table_id)?
            .ok_or_else(|| OrderError::SessionNotFound(format!("no active session at {table_id}")))?;
        let bill_id = session
            .active_bill_id
            .clone()
            .ok_or_else(|| OrderError::BillNotFound(format!("session {}", session.session_id)))?;
        let mut bill = txn
            .get_bill(&bill_id)?
            .ok_or_else(|| OrderError::BillNotFound(bill_id.clone()))?;
        billing::refresh_bill(&txn, &mut bill)?;
        let orders = txn.session_orders(&session.session_id)?;

        Ok(ActiveBillView {
            session_id: session.session_id,
            session_key: session.session_key,
            table_number: session.table_number_snapshot,
            bill,
            served_lines: billing::served_lines(&orders),
        })
    }

    /// A payment of one of the table's bills
    pub fn get_payment_for_table(&self, table_id: &str, payment_id: &str) -> ManagerResult<Payment> {
        let txn = self.storage.begin_read()?;
        let payment = txn
            .get_payment(payment_id)?
            .ok_or_else(|| OrderError::PaymentNotFound(payment_id.to_string()))?;
        let owned = txn
            .get_bill(&payment.bill_id)?
            .is_some_and(|bill| bill.table_id == table_id);
        if !owned {
            return Err(OrderError::PaymentNotFound(payment_id.to_string()).into());
        }
        Ok(payment)
    }

    // ========== Staff reads ==========

    pub fn get_order(&self, order_id: &str) -> ManagerResult<Order> {
        self.storage
            .begin_read()?
            .get_order(order_id)?
            .map(checked)
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()).into())
    }

    /// Payment lookup for gateway callbacks
    pub fn get_payment(&self, payment_id: &str) -> ManagerResult<Payment> {
        self.storage
            .begin_read()?
            .get_payment(payment_id)?
            .ok_or_else(|| OrderError::PaymentNotFound(payment_id.to_string()).into())
    }

    /// Submitted orders of every active session, oldest submission first
    pub fn staff_orders(&self, status: Option<OrderStatus>) -> ManagerResult<Vec<Order>> {
        let txn = self.storage.begin_read()?;
        let mut orders = Vec::new();
        for session_id in txn.active_session_ids()? {
            orders.extend(
                txn.session_orders(&session_id)?
                    .into_iter()
                    .filter(|o| o.phase != OrderPhase::Draft)
                    .filter(|o| status.is_none_or(|s| o.status == s))
                    .map(checked),
            );
        }
        orders.sort_by_key(|o| (o.submitted_at.unwrap_or(o.created_at), o.order_id.clone()));
        Ok(orders)
    }

    /// Bill board
    ///
    /// - REQUESTED: bills still awaiting payment (live totals)
    /// - PAID: paid, session not yet closed by a waiter
    /// - DONE: paid and closed
    pub fn staff_bills(&self, tab: BillTab) -> ManagerResult<Vec<Bill>> {
        let txn = self.storage.begin_read()?;
        let mut bills = Vec::new();
        for mut bill in txn.list_bills()? {
            let session_closed = txn
                .get_session(&bill.session_id)?
                .is_some_and(|s| s.status == SessionStatus::Closed);
            let keep = match tab {
                BillTab::Requested => bill.status.is_payable(),
                BillTab::Paid => bill.status == BillStatus::Paid && !session_closed,
                BillTab::Done => bill.status == BillStatus::Paid && session_closed,
            };
            if keep {
                billing::refresh_bill(&txn, &mut bill)?;
                bills.push(bill);
            }
        }
        bills.sort_by_key(|b| b.requested_at);
        Ok(bills)
    }

    pub fn table_info(&self, table_id: &str) -> ManagerResult<TableInfo> {
        Ok(self
            .storage
            .begin_read()?
            .get_table(table_id)?
            .ok_or_else(|| OrderError::TableNotFound(table_id.to_string()))?)
    }

    /// Current-epoch token for a table's QR code
    pub fn table_token(&self, table_id: &str) -> ManagerResult<(TableInfo, String)> {
        let table = self.table_info(table_id)?;
        let token = self.table_tokens.issue(&table.table_id, table.token_epoch);
        Ok((table, token))
    }

    pub fn list_tables(&self) -> ManagerResult<Vec<TableInfo>> {
        Ok(self.storage.begin_read()?.table_registry()?)
    }
}

/// sha256 over the serialized payload
/// sha256 over the issuing actor and the payload; the same key sent by
/// another principal does not replay someone else's reply
fn fingerprint(actor: &Actor, payload: &CommandPayload) -> ManagerResult<String> {
    let bytes = serde_json::to_vec(payload)
        .map_err(|e| ManagerError::Internal(format!("Cannot fingerprint command: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(actor.label().as_bytes());
    hasher.update([0u8]);
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Recorded reply of an already processed command
fn replay(
    reader: &impl StoreRead,
    command_id: &str,
    fingerprint: &str,
) -> ManagerResult<Option<CommandReply>> {
    match reader.processed_command(command_id)? {
        None => Ok(None),
        Some(record) if record.fingerprint != fingerprint => {
            tracing::warn!(command_id, "Idempotency key reused with a different payload or actor");
            Err(ManagerError::CommandReused(command_id.to_string()))
        }
        Some(record) => {
            tracing::debug!(command_id, "Duplicate command, replaying recorded reply");
            serde_json::from_value(record.reply)
                .map(Some)
                .map_err(|e| ManagerError::Internal(format!("Corrupt command record: {e}")))
        }
    }
}

/// Debug builds recompute the cached status / totals on every read
fn checked(order: Order) -> Order {
    if cfg!(debug_assertions) && !order.verify_derived() {
        tracing::warn!(order_id = %order.order_id, "Stored order caches drifted from derivation");
    }
    order
}

#[cfg(test)]
mod tests;
