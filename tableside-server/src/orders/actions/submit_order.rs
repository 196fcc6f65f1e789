//! SubmitOrder command handler
//!
//! DRAFT -> PENDING. Prices are re-read from the catalog at submit time
//! so a stale cart can never lock in an old price.

use crate::catalog::price_line;
use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use crate::utils::validation::{normalize_note, validate_optional_text, MAX_NOTE_LEN};
use shared::message::RealtimeEvent;
use shared::order::{OrderLine, OrderPhase};
use shared::util::monotonic_stamp;

use super::load_order_for;

/// SubmitOrder action
#[derive(Debug, Clone)]
pub struct SubmitOrderAction {
    pub order_id: String,
    pub order_note: Option<String>,
}

impl CommandHandler for SubmitOrderAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        // 1. Load order, must still be a draft
        let mut order = load_order_for(ctx, &metadata.actor, &self.order_id)?;
        if order.phase != OrderPhase::Draft {
            return Err(OrderError::transition("order", order.status, "submit"));
        }

        // 2. Session must be taking orders
        let session = ctx.load_session(&order.session_id)?;
        if !session.status.accepts_orders() {
            return Err(OrderError::SessionNotOpen {
                session_id: session.session_id,
                status: session.status.to_string(),
            });
        }

        // 3. Validate content
        if order.items.is_empty() {
            return Err(OrderError::EmptyOrder(self.order_id.clone()));
        }
        validate_optional_text(&self.order_note, "orderNote", MAX_NOTE_LEN)?;

        // 4. Re-price, keeping line ids stable
        let catalog = ctx.services().catalog;
        order.items = order
            .items
            .iter()
            .map(|line| price_line(catalog, &line.as_input(), line.line_id.clone()))
            .collect::<Result<Vec<OrderLine>, _>>()?;

        // 5. Move to PENDING
        order.phase = OrderPhase::Pending;
        order.order_note = normalize_note(self.order_note.clone());
        let submitted_at = monotonic_stamp(Some(order.created_at), metadata.timestamp);
        order.submitted_at = Some(submitted_at);
        ctx.save_order(&mut order, metadata.timestamp)?;

        if ctx.draft_order_id(&order.session_id)?.as_deref() == Some(order.order_id.as_str()) {
            ctx.clear_draft_order(&order.session_id)?;
        }

        tracing::info!(
            order_id = %order.order_id,
            table_id = %order.table_id,
            total_cents = order.total_cents,
            lines = order.items.len(),
            "Order submitted"
        );

        ctx.emit(
            &order.table_id,
            &order.session_id,
            RealtimeEvent::OrderSubmitted {
                order_id: order.order_id.clone(),
                status: order.status,
                total_cents: order.total_cents,
                submitted_at,
            },
        );

        Ok(CommandReply::Order(order))
    }
}
