//! StartLine / StartOrder command handlers
//!
//! QUEUED -> PREPARING for one line, or for every queued line at once.

use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::order::LineStatus;

use super::{emit_line_changes, ensure_kitchen_phase, order_reply, transition_line};

/// StartLine action
#[derive(Debug, Clone)]
pub struct StartLineAction {
    pub order_id: String,
    pub line_id: String,
}

impl CommandHandler for StartLineAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        let mut order = ctx.load_order(&self.order_id)?;
        ensure_kitchen_phase(&order, "start")?;
        let before = order.status;

        transition_line(
            &mut order,
            &self.line_id,
            LineStatus::Preparing,
            "start",
            metadata.timestamp,
        )?;
        ctx.save_order(&mut order, metadata.timestamp)?;

        emit_line_changes(ctx, &order, std::slice::from_ref(&self.line_id), before);
        Ok(order_reply(order))
    }
}

/// StartOrder action
#[derive(Debug, Clone)]
pub struct StartOrderAction {
    pub order_id: String,
}

impl CommandHandler for StartOrderAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        // 1. Load and validate
        let mut order = ctx.load_order(&self.order_id)?;
        ensure_kitchen_phase(&order, "start")?;
        let before = order.status;

        // 2. Start every queued line
        let queued: Vec<String> = order
            .items
            .iter()
            .filter(|l| l.status == LineStatus::Queued)
            .map(|l| l.line_id.clone())
            .collect();
        if queued.is_empty() {
            return Ok(order_reply(order));
        }
        for line_id in &queued {
            transition_line(
                &mut order,
                line_id,
                LineStatus::Preparing,
                "start",
                metadata.timestamp,
            )?;
        }
        ctx.save_order(&mut order, metadata.timestamp)?;

        emit_line_changes(ctx, &order, &queued, before);
        Ok(order_reply(order))
    }
}
