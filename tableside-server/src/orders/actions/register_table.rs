//! RegisterTable command handler
//!
//! Upserts a physical table. Renaming keeps the token epoch so printed QR
//! codes remain valid.

use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::session::TableInfo;

/// RegisterTable action
#[derive(Debug, Clone)]
pub struct RegisterTableAction {
    pub table_id: String,
    pub table_number: String,
}

impl CommandHandler for RegisterTableAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        _metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        let table_id = self.table_id.trim();
        let table_number = self.table_number.trim();
        if table_id.is_empty() || table_number.is_empty() {
            return Err(OrderError::Validation(
                "tableId and tableNumber must not be empty".to_string(),
            ));
        }

        let table = match ctx.load_table(table_id) {
            Ok(mut existing) => {
                existing.table_number = table_number.to_string();
                existing
            }
            Err(OrderError::TableNotFound(_)) => TableInfo {
                table_id: table_id.to_string(),
                table_number: table_number.to_string(),
                token_epoch: 1,
            },
            Err(e) => return Err(e),
        };
        ctx.save_table(&table)?;

        Ok(CommandReply::Table(table))
    }
}
