//! PayCash command handler

use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::bill::PaymentMethod;

use super::{load_payable_bill, settle_bill};

/// PayCash action
#[derive(Debug, Clone)]
pub struct PayCashAction {
    pub bill_id: String,
}

impl CommandHandler for PayCashAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        let bill = load_payable_bill(ctx, &metadata.actor, &self.bill_id, "pay")?;
        let bill = settle_bill(ctx, bill, PaymentMethod::Cash, metadata.timestamp)?;
        Ok(CommandReply::Bill(bill))
    }
}
