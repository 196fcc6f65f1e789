//! Keeps a [`LocalState`] in step with the server
//!
//! Realtime updates are applied as deltas; whatever the state cannot apply
//! is re-fetched over HTTP. Every (re)connect and every server resync starts
//! from a full cold load, since events sent while offline are not replayed.

use shared::error::ErrorCode;
use shared::message::RealtimeEvent;
use shared::session::SessionStatus;

use crate::draft::DraftRepository;
use crate::realtime::RealtimeUpdate;
use crate::state::{LocalState, Reconcile, Refetch};
use crate::{ClientError, ClientResult, TableApi};

pub struct TableSync<A, R> {
    api: A,
    drafts: R,
    table_id: String,
    state: LocalState,
}

impl<A: TableApi, R: DraftRepository> TableSync<A, R> {
    pub fn new(api: A, drafts: R, table_id: impl Into<String>) -> Self {
        let table_id = table_id.into();
        Self {
            api,
            drafts,
            state: LocalState::for_table(table_id.clone()),
            table_id,
        }
    }

    pub fn state(&self) -> &LocalState {
        &self.state
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn drafts(&self) -> &R {
        &self.drafts
    }

    /// Feed one update from [`crate::RealtimeClient`]
    pub async fn handle_update(&mut self, update: RealtimeUpdate) -> ClientResult<()> {
        match update {
            RealtimeUpdate::Connected { sequence, .. } => {
                tracing::debug!(table_id = %self.table_id, sequence, "Connected, cold loading");
                self.refetch(Refetch::All).await
            }
            RealtimeUpdate::Resync { reason } => {
                tracing::info!(table_id = %self.table_id, reason = %reason, "Server requested resync");
                self.refetch(Refetch::All).await
            }
            RealtimeUpdate::Disconnected { .. } => Ok(()),
            RealtimeUpdate::Rejected { status } => {
                tracing::warn!(table_id = %self.table_id, status, "Realtime credentials rejected");
                Err(ClientError::Api {
                    code: ErrorCode::InvalidTableToken,
                    message: ErrorCode::InvalidTableToken.message().to_string(),
                    status,
                })
            }
            RealtimeUpdate::Message(msg) => {
                let closes_tracked = matches!(msg.event, RealtimeEvent::SessionClosed { .. })
                    && self
                        .state
                        .session()
                        .is_some_and(|s| s.session_id == msg.session_id);

                match self.state.apply(&msg) {
                    Reconcile::Applied | Reconcile::Ignored => {}
                    Reconcile::NeedsRefetch(scope) => self.refetch(scope).await?,
                }

                if closes_tracked {
                    self.forget_drafts().await?;
                }
                Ok(())
            }
        }
    }

    /// Silent refresh after a rejected mutation
    ///
    /// A conflict means the local view was stale; the error is swallowed
    /// once the view has been reloaded. Anything else is returned as-is.
    pub async fn recover(&mut self, err: ClientError) -> ClientResult<()> {
        if err.needs_refetch() {
            tracing::debug!(code = ?err.code(), "Stale view, refreshing");
            return self.refetch(Refetch::All).await;
        }
        Err(err)
    }

    pub async fn refetch(&mut self, scope: Refetch) -> ClientResult<()> {
        match scope {
            Refetch::All | Refetch::Session => self.cold_load().await,
            Refetch::Bill => self.reload_bill().await,
            Refetch::Order(order_id) => match self.api.order(&order_id).await {
                Ok(order) => {
                    self.state.upsert_order(order);
                    Ok(())
                }
                // the order moved on with its session
                Err(e) if matches!(
                    e.code(),
                    Some(ErrorCode::OrderNotFound | ErrorCode::SessionMismatch)
                ) =>
                {
                    self.cold_load().await
                }
                Err(e) => Err(e),
            },
        }
    }

    async fn cold_load(&mut self) -> ClientResult<()> {
        let session = self.api.active_session().await?;
        let had_session = self.state.session().map(|s| s.session_key.clone());
        let has_bill = session.as_ref().is_some_and(|s| s.active_bill_id.is_some());
        let current_key = session.as_ref().map(|s| s.session_key.clone());
        self.state.replace_session(session);

        let Some(current_key) = current_key else {
            if had_session.is_some() {
                self.forget_drafts().await?;
            }
            return Ok(());
        };
        if had_session.is_some_and(|key| key != current_key) {
            self.drafts.clear_cart(&self.table_id).await?;
        }

        let orders = self.api.session_orders().await?;
        self.state.replace_orders(orders);
        if has_bill {
            self.reload_bill().await
        } else {
            self.state.replace_bill(None);
            Ok(())
        }
    }

    async fn reload_bill(&mut self) -> ClientResult<()> {
        match self.api.active_bill().await {
            Ok(view) => {
                self.state.replace_bill_view(view);
                Ok(())
            }
            Err(e) if e.code() == Some(ErrorCode::BillNotFound) => {
                self.state.replace_bill(None);
                Ok(())
            }
            Err(e) if e.code() == Some(ErrorCode::SessionNotFound) => self.cold_load_no_bill().await,
            Err(e) => Err(e),
        }
    }

    /// Session went away between the two reads
    async fn cold_load_no_bill(&mut self) -> ClientResult<()> {
        let session = self.api.active_session().await?;
        let gone = session.is_none();
        self.state.replace_session(session);
        self.state.replace_bill(None);
        if gone {
            self.forget_drafts().await?;
        }
        Ok(())
    }

    /// The party left: drop the cart and the session-order mapping
    async fn forget_drafts(&self) -> ClientResult<()> {
        tracing::info!(table_id = %self.table_id, "Session closed, clearing local draft");
        self.drafts.clear_cart(&self.table_id).await?;
        self.drafts.clear_session_order(&self.table_id).await
    }

    /// Session is open for ordering
    pub fn can_order(&self) -> bool {
        self.state
            .session()
            .is_some_and(|s| s.status == SessionStatus::Open)
    }
}
