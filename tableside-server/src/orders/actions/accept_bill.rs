//! AcceptBill command handler
//!
//! Staff confirms a paid bill and releases the table: the session closes
//! and the table's QR token epoch is bumped so old tokens stop working.

use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::bill::BillStatus;
use shared::message::RealtimeEvent;
use shared::session::SessionStatus;
use shared::util::monotonic_stamp;

/// AcceptBill action
#[derive(Debug, Clone)]
pub struct AcceptBillAction {
    pub bill_id: String,
}

impl CommandHandler for AcceptBillAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        // 1. Load bill and session
        let bill = ctx.load_bill(&self.bill_id)?;
        let mut session = ctx.load_session(&bill.session_id)?;

        // 2. Validate
        if session.status == SessionStatus::Closed {
            return Ok(CommandReply::Session(session));
        }
        if bill.status != BillStatus::Paid {
            return Err(OrderError::transition("bill", bill.status, "accept"));
        }
        if !session.status.can_transition_to(SessionStatus::Closed) {
            return Err(OrderError::transition("session", session.status, "close"));
        }

        // 3. PAID -> CLOSED
        let closed_at = monotonic_stamp(Some(session.last_stamp()), metadata.timestamp);
        session.status = SessionStatus::Closed;
        session.closed_at = Some(closed_at);
        ctx.save_session(&session)?;
        ctx.clear_active_session(&session.table_id)?;
        ctx.clear_draft_order(&session.session_id)?;

        // 4. Rotate the table token
        let mut table = ctx.load_table(&session.table_id)?;
        table.token_epoch += 1;
        ctx.save_table(&table)?;

        tracing::info!(
            session_id = %session.session_id,
            table_id = %table.table_id,
            token_epoch = table.token_epoch,
            "Session closed"
        );

        ctx.emit(
            &session.table_id,
            &session.session_id,
            RealtimeEvent::SessionClosed {
                session_id: session.session_id.clone(),
                status: session.status,
                closed_at,
            },
        );

        Ok(CommandReply::Session(session))
    }
}
