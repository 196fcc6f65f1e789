//! ReadyLine command handler

use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::order::LineStatus;

use super::{emit_line_changes, ensure_kitchen_phase, order_reply, transition_line};

/// ReadyLine action
#[derive(Debug, Clone)]
pub struct ReadyLineAction {
    pub order_id: String,
    pub line_id: String,
}

impl CommandHandler for ReadyLineAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        let mut order = ctx.load_order(&self.order_id)?;
        ensure_kitchen_phase(&order, "ready")?;
        let before = order.status;

        // PREPARING -> READY
        transition_line(
            &mut order,
            &self.line_id,
            LineStatus::Ready,
            "ready",
            metadata.timestamp,
        )?;
        ctx.save_order(&mut order, metadata.timestamp)?;

        emit_line_changes(ctx, &order, std::slice::from_ref(&self.line_id), before);
        Ok(order_reply(order))
    }
}
