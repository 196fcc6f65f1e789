//! redb-based storage for sessions, orders, bills and payments
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `sessions` | `session_id` | `Session` | Session records (never deleted) |
//! | `active_sessions` | `table_id` | `session_id` | At most one non-CLOSED session per table |
//! | `orders` | `order_id` | `Order` | Order records |
//! | `session_orders` | `(session_id, sequence)` | `order_id` | Orders of a session, creation order |
//! | `session_drafts` | `session_id` | `order_id` | Current draft of a session |
//! | `bills` | `bill_id` | `Bill` | Bill records |
//! | `payments` | `payment_id` | `Payment` | Online payment attempts |
//! | `tables` | `table_id` | `TableInfo` | Table registry + QR token epoch |
//! | `processed_commands` | `command_id` | `ProcessedCommand` | Idempotent replay |
//! | `sequence_counter` | `"seq"` | `u64` | Global write sequence |
//!
//! # Consistency
//!
//! redb admits one write transaction at a time, so every mutation is
//! serialized and validated against the state committed before it. Readers
//! get an MVCC snapshot through [`DiningStorage::begin_read`]; both
//! transaction kinds implement [`StoreRead`].

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::bill::{Bill, Payment};
use shared::order::Order;
use shared::session::{Session, TableInfo};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// key = session_id, value = JSON Session
const SESSIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// key = table_id, value = session_id of the non-CLOSED session
const ACTIVE_SESSIONS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("active_sessions");

/// key = order_id, value = JSON Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// key = (session_id, sequence at creation), value = order_id
const SESSION_ORDERS_TABLE: TableDefinition<(&str, u64), &str> =
    TableDefinition::new("session_orders");

/// key = session_id, value = order_id of the current draft
const SESSION_DRAFTS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("session_drafts");

/// key = bill_id, value = JSON Bill
const BILLS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("bills");

/// key = payment_id, value = JSON Payment
const PAYMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("payments");

/// key = table_id, value = JSON TableInfo
const TABLES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tables");

/// key = command_id, value = JSON ProcessedCommand
const PROCESSED_COMMANDS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("processed_commands");

/// key = "seq", value = u64
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

const SEQUENCE_KEY: &str = "seq";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Recorded outcome of a processed command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedCommand {
    /// sha256 of the command payload; a different payload under the same
    /// command id is rejected
    pub fingerprint: String,
    pub reply: serde_json::Value,
    pub recorded_at: i64,
}

/// Storage statistics
#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub sessions: u64,
    pub active_sessions: u64,
    pub orders: u64,
    pub bills: u64,
    pub payments: u64,
    pub tables: u64,
    pub processed_commands: u64,
    pub sequence: u64,
}

fn get_json<V: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StorageResult<Option<V>> {
    match table.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn all_json<V: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
) -> StorageResult<Vec<V>> {
    let mut values = Vec::new();
    for result in table.iter()? {
        let (_key, value) = result?;
        values.push(serde_json::from_slice(value.value())?);
    }
    Ok(values)
}

fn put_json<V: Serialize>(
    txn: &WriteTransaction,
    def: TableDefinition<'static, &'static str, &'static [u8]>,
    key: &str,
    value: &V,
) -> StorageResult<()> {
    let mut table = txn.open_table(def)?;
    let bytes = serde_json::to_vec(value)?;
    table.insert(key, bytes.as_slice())?;
    Ok(())
}

/// Read access shared by read and write transactions
pub trait StoreRead {
    fn get_session(&self, session_id: &str) -> StorageResult<Option<Session>>;

    /// session_id of the table's non-CLOSED session
    fn active_session_id(&self, table_id: &str) -> StorageResult<Option<String>>;

    /// session_ids of every non-CLOSED session
    fn active_session_ids(&self) -> StorageResult<Vec<String>>;

    fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>>;

    /// order_ids of a session in creation order
    fn session_order_ids(&self, session_id: &str) -> StorageResult<Vec<String>>;

    fn draft_order_id(&self, session_id: &str) -> StorageResult<Option<String>>;

    fn get_bill(&self, bill_id: &str) -> StorageResult<Option<Bill>>;

    fn list_bills(&self) -> StorageResult<Vec<Bill>>;

    fn get_payment(&self, payment_id: &str) -> StorageResult<Option<Payment>>;

    /// Every payment attempt made against a bill
    fn bill_payments(&self, bill_id: &str) -> StorageResult<Vec<Payment>>;

    fn get_table(&self, table_id: &str) -> StorageResult<Option<TableInfo>>;

    fn table_registry(&self) -> StorageResult<Vec<TableInfo>>;

    fn processed_command(&self, command_id: &str) -> StorageResult<Option<ProcessedCommand>>;

    fn current_sequence(&self) -> StorageResult<u64>;

    fn active_session_for_table(&self, table_id: &str) -> StorageResult<Option<Session>> {
        match self.active_session_id(table_id)? {
            Some(session_id) => self.get_session(&session_id),
            None => Ok(None),
        }
    }

    /// Orders of a session in creation order
    fn session_orders(&self, session_id: &str) -> StorageResult<Vec<Order>> {
        let mut orders = Vec::new();
        for order_id in self.session_order_ids(session_id)? {
            if let Some(order) = self.get_order(&order_id)? {
                orders.push(order);
            }
        }
        Ok(orders)
    }
}

macro_rules! impl_store_read {
    ($txn:ty) => {
        impl StoreRead for $txn {
            fn get_session(&self, session_id: &str) -> StorageResult<Option<Session>> {
                let table = self.open_table(SESSIONS_TABLE)?;
                get_json(&table, session_id)
            }

            fn active_session_id(&self, table_id: &str) -> StorageResult<Option<String>> {
                let table = self.open_table(ACTIVE_SESSIONS_TABLE)?;
                Ok(table.get(table_id)?.map(|guard| guard.value().to_string()))
            }

            fn active_session_ids(&self) -> StorageResult<Vec<String>> {
                let table = self.open_table(ACTIVE_SESSIONS_TABLE)?;
                let mut ids = Vec::new();
                for result in table.iter()? {
                    let (_table_id, session_id) = result?;
                    ids.push(session_id.value().to_string());
                }
                Ok(ids)
            }

            fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
                let table = self.open_table(ORDERS_TABLE)?;
                get_json(&table, order_id)
            }

            fn session_order_ids(&self, session_id: &str) -> StorageResult<Vec<String>> {
                let table = self.open_table(SESSION_ORDERS_TABLE)?;
                let range_start = (session_id, 0u64);
                let range_end = (session_id, u64::MAX);
                let mut ids = Vec::new();
                for result in table.range(range_start..=range_end)? {
                    let (_key, order_id) = result?;
                    ids.push(order_id.value().to_string());
                }
                Ok(ids)
            }

            fn draft_order_id(&self, session_id: &str) -> StorageResult<Option<String>> {
                let table = self.open_table(SESSION_DRAFTS_TABLE)?;
                Ok(table.get(session_id)?.map(|guard| guard.value().to_string()))
            }

            fn get_bill(&self, bill_id: &str) -> StorageResult<Option<Bill>> {
                let table = self.open_table(BILLS_TABLE)?;
                get_json(&table, bill_id)
            }

            fn list_bills(&self) -> StorageResult<Vec<Bill>> {
                let table = self.open_table(BILLS_TABLE)?;
                all_json(&table)
            }

            fn get_payment(&self, payment_id: &str) -> StorageResult<Option<Payment>> {
                let table = self.open_table(PAYMENTS_TABLE)?;
                get_json(&table, payment_id)
            }

            fn bill_payments(&self, bill_id: &str) -> StorageResult<Vec<Payment>> {
                let table = self.open_table(PAYMENTS_TABLE)?;
                let payments: Vec<Payment> = all_json(&table)?;
                Ok(payments.into_iter().filter(|p| p.bill_id == bill_id).collect())
            }

            fn get_table(&self, table_id: &str) -> StorageResult<Option<TableInfo>> {
                let table = self.open_table(TABLES_TABLE)?;
                get_json(&table, table_id)
            }

            fn table_registry(&self) -> StorageResult<Vec<TableInfo>> {
                let table = self.open_table(TABLES_TABLE)?;
                all_json(&table)
            }

            fn processed_command(
                &self,
                command_id: &str,
            ) -> StorageResult<Option<ProcessedCommand>> {
                let table = self.open_table(PROCESSED_COMMANDS_TABLE)?;
                get_json(&table, command_id)
            }

            fn current_sequence(&self) -> StorageResult<u64> {
                let table = self.open_table(SEQUENCE_TABLE)?;
                Ok(table
                    .get(SEQUENCE_KEY)?
                    .map(|guard| guard.value())
                    .unwrap_or(0))
            }
        }
    };
}

impl_store_read!(ReadTransaction);
impl_store_read!(WriteTransaction);

/// Dining storage backed by redb
#[derive(Clone)]
pub struct DiningStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for DiningStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiningStorage").finish_non_exhaustive()
    }
}

impl DiningStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: once `commit()`
    /// returns the transition is on disk.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests, oneshot tools)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            // Create all tables if they don't exist
            let _ = write_txn.open_table(SESSIONS_TABLE)?;
            let _ = write_txn.open_table(ACTIVE_SESSIONS_TABLE)?;
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(SESSION_ORDERS_TABLE)?;
            let _ = write_txn.open_table(SESSION_DRAFTS_TABLE)?;
            let _ = write_txn.open_table(BILLS_TABLE)?;
            let _ = write_txn.open_table(PAYMENTS_TABLE)?;
            let _ = write_txn.open_table(TABLES_TABLE)?;
            let _ = write_txn.open_table(PROCESSED_COMMANDS_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            if seq_table.get(SEQUENCE_KEY)?.is_none() {
                seq_table.insert(SEQUENCE_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction (blocks while another writer is active)
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Begin a read transaction (consistent snapshot)
    pub fn begin_read(&self) -> StorageResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    // ========== Sequence ==========

    /// Current sequence (read-only)
    pub fn get_current_sequence(&self) -> StorageResult<u64> {
        self.begin_read()?.current_sequence()
    }

    /// Set sequence number (within transaction)
    pub fn set_sequence(&self, txn: &WriteTransaction, sequence: u64) -> StorageResult<()> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        table.insert(SEQUENCE_KEY, sequence)?;
        Ok(())
    }

    // ========== Command Idempotency ==========

    pub fn is_command_processed(&self, command_id: &str) -> StorageResult<bool> {
        Ok(self.begin_read()?.processed_command(command_id)?.is_some())
    }

    pub fn record_command(
        &self,
        txn: &WriteTransaction,
        command_id: &str,
        record: &ProcessedCommand,
    ) -> StorageResult<()> {
        put_json(txn, PROCESSED_COMMANDS_TABLE, command_id, record)
    }

    /// Remove command records recorded before `older_than`; returns the count
    pub fn prune_command_records(
        &self,
        txn: &WriteTransaction,
        older_than: i64,
    ) -> StorageResult<usize> {
        let mut table = txn.open_table(PROCESSED_COMMANDS_TABLE)?;
        let mut expired = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            let record: ProcessedCommand = serde_json::from_slice(value.value())?;
            if record.recorded_at < older_than {
                expired.push(key.value().to_string());
            }
        }
        for command_id in &expired {
            table.remove(command_id.as_str())?;
        }
        Ok(expired.len())
    }

    // ========== Sessions ==========

    pub fn store_session(&self, txn: &WriteTransaction, session: &Session) -> StorageResult<()> {
        put_json(txn, SESSIONS_TABLE, &session.session_id, session)
    }

    pub fn set_active_session(
        &self,
        txn: &WriteTransaction,
        table_id: &str,
        session_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(ACTIVE_SESSIONS_TABLE)?;
        table.insert(table_id, session_id)?;
        Ok(())
    }

    pub fn clear_active_session(&self, txn: &WriteTransaction, table_id: &str) -> StorageResult<()> {
        let mut table = txn.open_table(ACTIVE_SESSIONS_TABLE)?;
        table.remove(table_id)?;
        Ok(())
    }

    // ========== Orders ==========

    pub fn store_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        put_json(txn, ORDERS_TABLE, &order.order_id, order)
    }

    pub fn index_session_order(
        &self,
        txn: &WriteTransaction,
        session_id: &str,
        sequence: u64,
        order_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(SESSION_ORDERS_TABLE)?;
        table.insert((session_id, sequence), order_id)?;
        Ok(())
    }

    pub fn set_draft_order(
        &self,
        txn: &WriteTransaction,
        session_id: &str,
        order_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(SESSION_DRAFTS_TABLE)?;
        table.insert(session_id, order_id)?;
        Ok(())
    }

    pub fn clear_draft_order(&self, txn: &WriteTransaction, session_id: &str) -> StorageResult<()> {
        let mut table = txn.open_table(SESSION_DRAFTS_TABLE)?;
        table.remove(session_id)?;
        Ok(())
    }

    // ========== Bills / Payments ==========

    pub fn store_bill(&self, txn: &WriteTransaction, bill: &Bill) -> StorageResult<()> {
        put_json(txn, BILLS_TABLE, &bill.bill_id, bill)
    }

    pub fn store_payment(&self, txn: &WriteTransaction, payment: &Payment) -> StorageResult<()> {
        put_json(txn, PAYMENTS_TABLE, &payment.payment_id, payment)
    }

    // ========== Table registry ==========

    pub fn store_table(&self, txn: &WriteTransaction, table: &TableInfo) -> StorageResult<()> {
        put_json(txn, TABLES_TABLE, &table.table_id, table)
    }

    // ========== Stats ==========

    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.begin_read()?;
        Ok(StorageStats {
            sessions: read_txn.open_table(SESSIONS_TABLE)?.len()?,
            active_sessions: read_txn.open_table(ACTIVE_SESSIONS_TABLE)?.len()?,
            orders: read_txn.open_table(ORDERS_TABLE)?.len()?,
            bills: read_txn.open_table(BILLS_TABLE)?.len()?,
            payments: read_txn.open_table(PAYMENTS_TABLE)?.len()?,
            tables: read_txn.open_table(TABLES_TABLE)?.len()?,
            processed_commands: read_txn.open_table(PROCESSED_COMMANDS_TABLE)?.len()?,
            sequence: read_txn.current_sequence()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::session::SessionStatus;

    fn create_test_session(session_id: &str, table_id: &str) -> Session {
        Session {
            session_id: session_id.to_string(),
            table_id: table_id.to_string(),
            table_number_snapshot: "7".to_string(),
            session_key: "key-1".to_string(),
            status: SessionStatus::Open,
            opened_at: 1000,
            bill_requested_at: None,
            paid_at: None,
            closed_at: None,
            active_bill_id: None,
        }
    }

    #[test]
    fn test_sequence_roundtrip() {
        let storage = DiningStorage::open_in_memory().unwrap();
        assert_eq!(storage.get_current_sequence().unwrap(), 0);

        let txn = storage.begin_write().unwrap();
        storage.set_sequence(&txn, 5).unwrap();
        assert_eq!(txn.current_sequence().unwrap(), 5);
        txn.commit().unwrap();

        assert_eq!(storage.get_current_sequence().unwrap(), 5);
    }

    #[test]
    fn test_active_session_index() {
        let storage = DiningStorage::open_in_memory().unwrap();
        let session = create_test_session("s1", "t1");

        let txn = storage.begin_write().unwrap();
        storage.store_session(&txn, &session).unwrap();
        storage.set_active_session(&txn, "t1", "s1").unwrap();
        txn.commit().unwrap();

        let read = storage.begin_read().unwrap();
        assert_eq!(read.active_session_for_table("t1").unwrap(), Some(session));
        assert_eq!(read.active_session_ids().unwrap(), vec!["s1".to_string()]);
        drop(read);

        let txn = storage.begin_write().unwrap();
        storage.clear_active_session(&txn, "t1").unwrap();
        txn.commit().unwrap();

        let read = storage.begin_read().unwrap();
        assert!(read.active_session_id("t1").unwrap().is_none());
        // 会话记录本身保留
        assert!(read.get_session("s1").unwrap().is_some());
    }

    #[test]
    fn test_session_orders_keep_creation_order() {
        let storage = DiningStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        for (seq, id) in [(9u64, "o-b"), (3, "o-a"), (12, "o-c")] {
            let order = Order::new_draft(id.into(), "s1".into(), "t1".into(), "7".into(), 1);
            storage.store_order(&txn, &order).unwrap();
            storage.index_session_order(&txn, "s1", seq, id).unwrap();
        }
        // another session must not leak into the range
        storage.index_session_order(&txn, "s2", 1, "o-x").unwrap();
        txn.commit().unwrap();

        let read = storage.begin_read().unwrap();
        assert_eq!(read.session_order_ids("s1").unwrap(), vec!["o-a", "o-b", "o-c"]);
        assert_eq!(read.session_orders("s1").unwrap().len(), 3);
    }

    #[test]
    fn test_command_record() {
        let storage = DiningStorage::open_in_memory().unwrap();
        assert!(!storage.is_command_processed("cmd-1").unwrap());

        let record = ProcessedCommand {
            fingerprint: "abc".into(),
            reply: serde_json::json!({"kind": "order"}),
            recorded_at: 1,
        };
        let txn = storage.begin_write().unwrap();
        storage.record_command(&txn, "cmd-1", &record).unwrap();
        txn.commit().unwrap();

        assert!(storage.is_command_processed("cmd-1").unwrap());
        let read = storage.begin_read().unwrap();
        assert_eq!(read.processed_command("cmd-1").unwrap(), Some(record));
    }

    #[test]
    fn test_prune_command_records() {
        let storage = DiningStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        for (id, at) in [("old-1", 100), ("old-2", 200), ("fresh", 5_000)] {
            let record = ProcessedCommand {
                fingerprint: id.into(),
                reply: serde_json::json!({}),
                recorded_at: at,
            };
            storage.record_command(&txn, id, &record).unwrap();
        }
        txn.commit().unwrap();

        let txn = storage.begin_write().unwrap();
        assert_eq!(storage.prune_command_records(&txn, 1_000).unwrap(), 2);
        txn.commit().unwrap();

        assert!(!storage.is_command_processed("old-1").unwrap());
        assert!(storage.is_command_processed("fresh").unwrap());
        assert_eq!(storage.get_stats().unwrap().processed_commands, 1);
    }

    #[test]
    fn test_table_registry_on_both_transactions() {
        let storage = DiningStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        for (id, number) in [("t1", "1"), ("t2", "2")] {
            let info = TableInfo {
                table_id: id.into(),
                table_number: number.into(),
                token_epoch: 0,
            };
            storage.store_table(&txn, &info).unwrap();
        }
        assert_eq!(StoreRead::table_registry(&txn).unwrap().len(), 2);
        txn.commit().unwrap();

        let read = storage.begin_read().unwrap();
        let numbers: Vec<_> = read
            .table_registry()
            .unwrap()
            .into_iter()
            .map(|t| t.table_number)
            .collect();
        assert_eq!(numbers, vec!["1", "2"]);
    }

    #[test]
    fn test_aborted_transaction_leaves_nothing() {
        let storage = DiningStorage::open_in_memory().unwrap();
        {
            let txn = storage.begin_write().unwrap();
            storage
                .store_session(&txn, &create_test_session("s1", "t1"))
                .unwrap();
            // dropped without commit
        }
        assert!(storage.begin_read().unwrap().get_session("s1").unwrap().is_none());
    }

    #[test]
    fn test_file_backed_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");
        {
            let storage = DiningStorage::open(&path).unwrap();
            let txn = storage.begin_write().unwrap();
            storage
                .store_table(
                    &txn,
                    &TableInfo {
                        table_id: "t1".into(),
                        table_number: "1".into(),
                        token_epoch: 3,
                    },
                )
                .unwrap();
            storage.set_sequence(&txn, 42).unwrap();
            txn.commit().unwrap();
        }
        let storage = DiningStorage::open(&path).unwrap();
        assert_eq!(storage.get_current_sequence().unwrap(), 42);
        let table = storage.begin_read().unwrap().get_table("t1").unwrap().unwrap();
        assert_eq!(table.token_epoch, 3);
        assert_eq!(storage.get_stats().unwrap().tables, 1);
    }
}
