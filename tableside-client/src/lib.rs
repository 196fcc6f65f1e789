//! Tableside Client - table devices and staff screens
//!
//! # Pieces
//!
//! - [`HttpClient`]: typed calls for the customer and staff APIs
//! - [`RealtimeClient`]: WebSocket subscription with reconnect + backoff
//! - [`LocalState`] / [`TableSync`]: monotonic merge of pushed events,
//!   re-fetch when a delta cannot be applied
//! - [`DraftCart`] / [`DraftRepository`]: the device-local cart, keyed by
//!   table and dropped when the table is recycled
//! - [`PaymentPoller`]: payment return page, waits for the server-side
//!   confirmation
//!
//! # Example
//!
//! ```ignore
//! let config = ClientConfig::for_table("https://pos.example.com", "t12", token);
//! let http = config.build_http_client()?;
//! let order = resolve_session_order(&http, &drafts, "t12").await?;
//!
//! let (mut updates, _task) = RealtimeClient::new(&config)?.spawn(shutdown.clone());
//! let mut sync = TableSync::new(http, drafts, "t12");
//! while let Some(update) = updates.recv().await {
//!     sync.handle_update(update).await?;
//! }
//! ```

pub mod api;
pub mod config;
pub mod draft;
pub mod error;
pub mod http;
pub mod payment_poller;
pub mod realtime;
pub mod session_order;
pub mod state;
pub mod sync;

pub use api::TableApi;
pub use config::{ClientConfig, Credentials, RealtimeConfig};
pub use draft::{
    DraftCart, DraftLine, DraftModifier, DraftRepository, JsonFileDraftRepository,
    MemoryDraftRepository, StoredSessionOrder,
};
pub use error::{ClientError, ClientResult};
pub use http::{HttpClient, LineAction, OrderAction, new_idempotency_key};
pub use payment_poller::{PaymentPoller, PaymentReturn};
pub use realtime::{RealtimeClient, RealtimeUpdate};
pub use session_order::{SessionOrder, resolve_session_order};
pub use state::{LocalState, Reconcile, Refetch};
pub use sync::TableSync;
