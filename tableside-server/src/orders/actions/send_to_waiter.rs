//! SendToWaiter command handler
//!
//! READY -> READY_TO_SERVICE; notifies waiters that food is at the pass.

use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::message::RealtimeEvent;
use shared::order::{OrderPhase, OrderStatus};

use super::{emit_status_changed, order_reply};

/// SendToWaiter action
#[derive(Debug, Clone)]
pub struct SendToWaiterAction {
    pub order_id: String,
}

impl CommandHandler for SendToWaiterAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        let mut order = ctx.load_order(&self.order_id)?;

        // 已交给服务员: no-op
        if order.phase == OrderPhase::SentToWaiter {
            return Ok(order_reply(order));
        }
        if order.status != OrderStatus::Ready {
            return Err(OrderError::transition("order", order.status, "send to waiter"));
        }

        order.phase = OrderPhase::SentToWaiter;
        ctx.save_order(&mut order, metadata.timestamp)?;

        ctx.emit(
            &order.table_id,
            &order.session_id,
            RealtimeEvent::OrderReadyToServe {
                order_id: order.order_id.clone(),
                table_number: order.table_number_snapshot.clone(),
            },
        );
        emit_status_changed(ctx, &order);

        Ok(order_reply(order))
    }
}
