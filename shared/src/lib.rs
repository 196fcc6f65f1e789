//! Shared types for Tableside
//!
//! The wire contract between the server and its clients: the session /
//! order / bill data model, forward-only status orderings, the derived order
//! status, the realtime event catalog and the error / response envelope.

pub mod bill;
pub mod dto;
pub mod error;
pub mod lifecycle;
pub mod message;
pub mod order;
pub mod session;
pub mod staff;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use lifecycle::Lifecycle;
pub use message::{BusMessage, ChannelKey, RealtimeEvent, ServerFrame};
