//! CancelLine command handler
//!
//! Any live, not-yet-served line of a submitted order can be cancelled.
//! Cancelling the last live line derives the order to CANCELLED.

use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::order::{LineStatus, OrderPhase};

use super::{emit_line_changes, order_reply, transition_line};

/// CancelLine action
#[derive(Debug, Clone)]
pub struct CancelLineAction {
    pub order_id: String,
    pub line_id: String,
}

impl CommandHandler for CancelLineAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        // 1. Load order
        let mut order = ctx.load_order(&self.order_id)?;

        // 2. Validate order phase
        match order.phase {
            OrderPhase::Pending | OrderPhase::Accepted | OrderPhase::SentToWaiter => {}
            _ => return Err(OrderError::transition("order", order.status, "cancel a line of")),
        }
        let before = order.status;

        // 3. Cancel the line (edge table rejects served/cancelled)
        transition_line(
            &mut order,
            &self.line_id,
            LineStatus::Cancelled,
            "cancel",
            metadata.timestamp,
        )?;
        ctx.save_order(&mut order, metadata.timestamp)?;

        tracing::info!(
            order_id = %order.order_id,
            line_id = %self.line_id,
            actor = %metadata.actor.label(),
            "Line cancelled"
        );

        emit_line_changes(ctx, &order, std::slice::from_ref(&self.line_id), before);
        Ok(order_reply(order))
    }
}
