//! AcceptOrder command handler

use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::message::RealtimeEvent;
use shared::order::{OrderPhase, OrderStatus};

use super::emit_status_changed;

/// AcceptOrder action
#[derive(Debug, Clone)]
pub struct AcceptOrderAction {
    pub order_id: String,
}

impl CommandHandler for AcceptOrderAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        // 1. Load order
        let mut order = ctx.load_order(&self.order_id)?;

        // 2. Only a pending order can be accepted (second accept loses here)
        if order.status != OrderStatus::Pending {
            return Err(OrderError::transition("order", order.status, "accept"));
        }

        // 3. PENDING -> ACCEPTED
        order.phase = OrderPhase::Accepted;
        ctx.save_order(&mut order, metadata.timestamp)?;

        tracing::info!(
            order_id = %order.order_id,
            actor = %metadata.actor.label(),
            "Order accepted"
        );

        ctx.emit(
            &order.table_id,
            &order.session_id,
            RealtimeEvent::OrderAccepted {
                order_id: order.order_id.clone(),
            },
        );
        emit_status_changed(ctx, &order);

        Ok(CommandReply::Order(order))
    }
}
