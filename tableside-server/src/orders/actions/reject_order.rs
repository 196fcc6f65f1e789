//! RejectOrder command handler
//!
//! Allowed while pending, or after acceptance as long as the kitchen has
//! not touched any line. Every live line is cancelled.

use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::order::{LineStatus, OrderPhase, OrderStatus};

use super::emit_status_changed;

/// RejectOrder action
#[derive(Debug, Clone)]
pub struct RejectOrderAction {
    pub order_id: String,
}

impl CommandHandler for RejectOrderAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        // 1. Load order
        let mut order = ctx.load_order(&self.order_id)?;

        // 2. Validate
        let rejectable = match order.status {
            OrderStatus::Pending => true,
            OrderStatus::Accepted => order.untouched_by_kitchen(),
            _ => false,
        };
        if !rejectable {
            return Err(OrderError::transition("order", order.status, "reject"));
        }

        // 3. Cancel live lines
        for line in order.items.iter_mut() {
            if line.status.can_transition_to(LineStatus::Cancelled) {
                line.status = LineStatus::Cancelled;
                line.cancelled_at = Some(metadata.timestamp);
            }
        }
        order.phase = OrderPhase::Rejected;
        ctx.save_order(&mut order, metadata.timestamp)?;

        tracing::info!(
            order_id = %order.order_id,
            actor = %metadata.actor.label(),
            "Order rejected"
        );

        emit_status_changed(ctx, &order);
        Ok(CommandReply::Order(order))
    }
}
