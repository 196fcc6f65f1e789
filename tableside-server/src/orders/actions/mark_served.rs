//! MarkServed command handler
//!
//! READY_TO_SERVICE -> SERVED. Sweeps every live line to SERVED; served
//! lines are what the bill charges for.

use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::order::{LineStatus, OrderPhase, OrderStatus};

use super::{emit_line_changes, order_reply};

/// MarkServed action
#[derive(Debug, Clone)]
pub struct MarkServedAction {
    pub order_id: String,
}

impl CommandHandler for MarkServedAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        // 1. Load and validate
        let mut order = ctx.load_order(&self.order_id)?;
        if order.status != OrderStatus::ReadyToService {
            return Err(OrderError::transition("order", order.status, "mark served"));
        }
        let before = order.status;

        // 2. Sweep live lines to SERVED
        let mut changed = Vec::new();
        for line in order.items.iter_mut() {
            if line.status.is_live() && line.status != LineStatus::Served {
                line.status = LineStatus::Served;
                line.served_at.get_or_insert(metadata.timestamp);
                changed.push(line.line_id.clone());
            }
        }

        // 3. Persist
        order.phase = OrderPhase::Served;
        ctx.save_order(&mut order, metadata.timestamp)?;

        tracing::info!(
            order_id = %order.order_id,
            served_total_cents = order.served_total_cents(),
            "Order served"
        );

        emit_line_changes(ctx, &order, &changed, before);
        Ok(order_reply(order))
    }
}
