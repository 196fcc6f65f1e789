//! Session / order / bill state machine
//!
//! - **traits**: command handler contract and the transaction-bound context
//! - **actions**: one handler per command
//! - **manager**: `DiningManager`, serialized command execution and reads
//! - **storage**: redb persistence
//! - **billing**: live bill totals
//! - **kitchen**: auto-cook simulator
//!
//! # Architecture
//!
//! ```text
//! Command → DiningManager → Action (write txn) → commit → MessageBus
//!                                                          ├─ ws table:{id}
//!                                                          ├─ ws staff:{role}
//!                                                          └─ AutoCook
//! ```

pub mod traits;

pub mod actions;
pub mod billing;
pub mod command;
pub mod kitchen;
pub mod manager;
pub mod storage;

// Re-exports
pub use command::{CommandPayload, CommandReply, DiningCommand};
pub use kitchen::AutoCook;
pub use manager::{DiningManager, ManagerError, ManagerResult};
pub use storage::DiningStorage;
pub use traits::{Actor, OrderError};
