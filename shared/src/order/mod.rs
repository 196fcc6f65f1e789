//! Order aggregate types
//!
//! - [`Order`]: the persisted record (phase, lines, cached totals/status)
//! - [`OrderLine`]: a line with frozen catalog snapshots
//! - [`derive_status`]: the single source of truth for the order status

pub mod snapshot;
pub mod status;
pub mod types;

// Re-exports
pub use snapshot::Order;
pub use status::{OrderPhase, OrderStatus, derive_status};
pub use types::*;
