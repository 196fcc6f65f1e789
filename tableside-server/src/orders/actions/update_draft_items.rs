//! UpdateDraftItems command handler
//!
//! Replaces the draft's lines wholesale. Every line is re-priced from the
//! current catalog and gets a fresh line id.

use crate::catalog::price_line;
use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use crate::utils::validation::MAX_DRAFT_LINES;
use shared::message::RealtimeEvent;
use shared::order::{CartLineInput, OrderLine, OrderPhase};
use shared::util::new_id;

use super::load_order_for;

/// UpdateDraftItems action
#[derive(Debug, Clone)]
pub struct UpdateDraftItemsAction {
    pub order_id: String,
    pub items: Vec<CartLineInput>,
}

impl CommandHandler for UpdateDraftItemsAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        // 1. Load and validate
        let mut order = load_order_for(ctx, &metadata.actor, &self.order_id)?;
        if order.phase != OrderPhase::Draft {
            return Err(OrderError::transition("order", order.status, "update items of"));
        }
        let session = ctx.load_session(&order.session_id)?;
        if !session.status.accepts_orders() {
            return Err(OrderError::SessionNotOpen {
                session_id: session.session_id,
                status: session.status.to_string(),
            });
        }
        if self.items.len() > MAX_DRAFT_LINES {
            return Err(OrderError::Validation(format!(
                "A draft holds at most {MAX_DRAFT_LINES} lines"
            )));
        }

        // 2. Price every line from the catalog
        let catalog = ctx.services().catalog;
        order.items = self
            .items
            .iter()
            .map(|input| price_line(catalog, input, new_id()))
            .collect::<Result<Vec<OrderLine>, _>>()?;

        // 3. Persist
        ctx.save_order(&mut order, metadata.timestamp)?;

        ctx.emit(
            &order.table_id,
            &order.session_id,
            RealtimeEvent::OrderUpdated {
                order_id: order.order_id.clone(),
                status: order.status,
                total_cents: order.total_cents,
            },
        );

        Ok(CommandReply::Order(order))
    }
}
