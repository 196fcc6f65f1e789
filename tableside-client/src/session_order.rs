//! Which draft order belongs to this device's cart
//!
//! The server hands out the session's draft on every scan. The stored
//! `(orderId, sessionKey)` mapping tells the device whether the table was
//! recycled since the cart was filled: a different `sessionKey` means the
//! cart belongs to a party that already left.

use shared::dto::DraftOrderHandle;

use crate::draft::{DraftRepository, StoredSessionOrder};
use crate::{ClientResult, TableApi};

/// Draft order to fill for this table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOrder {
    pub order_id: String,
    pub session_id: String,
    pub session_key: String,
    /// The stored mapping was for an earlier session; its cart was dropped
    pub recycled: bool,
}

impl From<(DraftOrderHandle, bool)> for SessionOrder {
    fn from((handle, recycled): (DraftOrderHandle, bool)) -> Self {
        Self {
            order_id: handle.order_id,
            session_id: handle.session_id,
            session_key: handle.session_key,
            recycled,
        }
    }
}

/// Open (or reuse) the session's draft and reconcile the stored mapping
pub async fn resolve_session_order(
    api: &dyn TableApi,
    repo: &dyn DraftRepository,
    table_id: &str,
) -> ClientResult<SessionOrder> {
    let handle = match api.open_draft_order().await {
        Ok(handle) => handle,
        Err(e) => {
            if e.needs_rescan() {
                // QR 已失效，本地映射没有意义
                repo.clear_session_order(table_id).await?;
            }
            return Err(e);
        }
    };

    let stored = repo.load_session_order(table_id).await?;
    let recycled = stored
        .as_ref()
        .is_some_and(|s| s.session_key != handle.session_key);
    if recycled {
        tracing::info!(
            table_id = %table_id,
            session_id = %handle.session_id,
            "Table recycled since last visit, dropping stale cart"
        );
        repo.clear_cart(table_id).await?;
    }

    let current = StoredSessionOrder {
        order_id: handle.order_id.clone(),
        session_key: handle.session_key.clone(),
    };
    if stored.as_ref() != Some(&current) {
        repo.save_session_order(table_id, &current).await?;
    }

    Ok(SessionOrder::from((handle, recycled)))
}
