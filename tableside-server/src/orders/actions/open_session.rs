//! OpenSession / OpenDraftOrder command handlers
//!
//! A scan of the table QR lands here. At most one non-closed session exists
//! per table; scanning again returns it instead of opening a second one.

use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::dto::DraftOrderHandle;
use shared::message::RealtimeEvent;
use shared::order::{Order, OrderPhase};
use shared::session::{Session, SessionStatus, TableInfo};
use shared::util::new_id;

/// OpenSession action
#[derive(Debug, Clone)]
pub struct OpenSessionAction {
    pub table_id: String,
    pub token: String,
}

impl CommandHandler for OpenSessionAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        let table = ctx.authorize_table(&self.table_id, &self.token)?;
        let session = open_or_get_session(ctx, &table, metadata.timestamp)?;
        Ok(CommandReply::Session(session))
    }
}

/// OpenDraftOrder action
#[derive(Debug, Clone)]
pub struct OpenDraftOrderAction {
    pub table_id: String,
    pub token: String,
}

impl CommandHandler for OpenDraftOrderAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        // 1. Authorize and resolve the session
        let table = ctx.authorize_table(&self.table_id, &self.token)?;
        let session = open_or_get_session(ctx, &table, metadata.timestamp)?;

        // 2. Reuse the current draft if there is one
        if let Some(draft_id) = ctx.draft_order_id(&session.session_id)? {
            let draft = ctx.load_order(&draft_id)?;
            if draft.phase == OrderPhase::Draft {
                return Ok(CommandReply::DraftOrder(handle(&draft, &session)));
            }
            // stale pointer
            ctx.clear_draft_order(&session.session_id)?;
        }

        // 3. New drafts only while ordering is open
        if !session.status.accepts_orders() {
            return Err(OrderError::SessionNotOpen {
                session_id: session.session_id.clone(),
                status: session.status.to_string(),
            });
        }

        let mut draft = Order::new_draft(
            new_id(),
            session.session_id.clone(),
            table.table_id.clone(),
            session.table_number_snapshot.clone(),
            metadata.timestamp,
        );
        ctx.save_order(&mut draft, metadata.timestamp)?;
        ctx.index_order(&draft)?;
        ctx.set_draft_order(&session.session_id, &draft.order_id)?;

        tracing::debug!(
            order_id = %draft.order_id,
            session_id = %session.session_id,
            "Draft order created"
        );

        Ok(CommandReply::DraftOrder(handle(&draft, &session)))
    }
}

fn handle(draft: &Order, session: &Session) -> DraftOrderHandle {
    DraftOrderHandle {
        order_id: draft.order_id.clone(),
        session_id: session.session_id.clone(),
        session_key: session.session_key.clone(),
        status: draft.status,
    }
}

/// Current non-closed session of the table, or a fresh OPEN one
pub(super) fn open_or_get_session(
    ctx: &mut CommandContext<'_>,
    table: &TableInfo,
    now: i64,
) -> Result<Session, OrderError> {
    if let Some(existing) = ctx.active_session(&table.table_id)? {
        return Ok(existing);
    }

    let session = Session {
        session_id: new_id(),
        table_id: table.table_id.clone(),
        table_number_snapshot: table.table_number.clone(),
        session_key: new_id(),
        status: SessionStatus::Open,
        opened_at: now,
        bill_requested_at: None,
        paid_at: None,
        closed_at: None,
        active_bill_id: None,
    };
    ctx.save_session(&session)?;
    ctx.set_active_session(&session)?;

    tracing::info!(
        session_id = %session.session_id,
        table_id = %table.table_id,
        "Session opened"
    );

    ctx.emit(
        &session.table_id,
        &session.session_id,
        RealtimeEvent::SessionOpened {
            session_id: session.session_id.clone(),
            session_key: session.session_key.clone(),
            status: session.status,
        },
    );
    Ok(session)
}
