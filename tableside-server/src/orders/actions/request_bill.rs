//! RequestBill command handler
//!
//! OPEN -> BILL_REQUESTED and creates the session's bill. Repeating the
//! request after that returns the existing bill with its live total.

use crate::orders::billing;
use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use crate::utils::validation::{normalize_note, validate_optional_text, MAX_NOTE_LEN};
use shared::bill::{Bill, BillStatus};
use shared::message::RealtimeEvent;
use shared::session::SessionStatus;
use shared::util::{monotonic_stamp, new_id};

/// RequestBill action
#[derive(Debug, Clone)]
pub struct RequestBillAction {
    pub session_id: String,
    pub note: Option<String>,
}

impl CommandHandler for RequestBillAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        // 1. Load session
        let mut session = ctx.load_session(&self.session_id)?;
        metadata.actor.ensure_table(&session.table_id)?;

        match session.status {
            SessionStatus::Open => {}
            SessionStatus::Closed => {
                return Err(OrderError::SessionNotOpen {
                    session_id: session.session_id,
                    status: session.status.to_string(),
                });
            }
            // 已请求过账单: return it
            _ => {
                let bill_id = session.active_bill_id.clone().ok_or_else(|| {
                    OrderError::BillNotFound(format!("session {}", session.session_id))
                })?;
                let mut bill = ctx.load_bill(&bill_id)?;
                billing::refresh_bill(ctx.reader(), &mut bill)?;
                return Ok(CommandReply::Bill(bill));
            }
        }

        // 2. Validate note
        validate_optional_text(&self.note, "note", MAX_NOTE_LEN)?;

        // 3. Create the bill at the live total
        let live = billing::session_live_total(ctx.reader(), &session.session_id)?;
        let requested_at = monotonic_stamp(Some(session.last_stamp()), metadata.timestamp);
        let bill = Bill {
            bill_id: new_id(),
            session_id: session.session_id.clone(),
            table_id: session.table_id.clone(),
            table_number_snapshot: session.table_number_snapshot.clone(),
            status: BillStatus::Requested,
            method: None,
            total_cents: live.total_cents,
            requested_at,
            paid_at: None,
            cancelled_at: None,
            note: normalize_note(self.note.clone()),
            order_ids: live.order_ids,
        };

        // 4. OPEN -> BILL_REQUESTED
        session.status = SessionStatus::BillRequested;
        session.bill_requested_at = Some(requested_at);
        session.active_bill_id = Some(bill.bill_id.clone());

        ctx.save_bill(&bill)?;
        ctx.save_session(&session)?;

        tracing::info!(
            bill_id = %bill.bill_id,
            session_id = %session.session_id,
            total_cents = bill.total_cents,
            "Bill requested"
        );

        ctx.emit(
            &bill.table_id,
            &bill.session_id,
            RealtimeEvent::BillRequested {
                bill_id: bill.bill_id.clone(),
                status: bill.status,
                total_cents: bill.total_cents,
            },
        );

        Ok(CommandReply::Bill(bill))
    }
}
