//! ConfirmOnlinePayment command handler
//!
//! Applies a verified gateway outcome. Duplicate notifications with the
//! same outcome are no-ops; a conflicting outcome for a settled payment is
//! rejected. A failed attempt releases the bill back to `REQUESTED` only
//! when no other attempt on it is still pending.

use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::bill::{BillStatus, PaymentMethod, PaymentOutcome, PaymentStatus};
use shared::message::RealtimeEvent;

use super::settle_bill;

/// ConfirmOnlinePayment action
#[derive(Debug, Clone)]
pub struct ConfirmOnlinePaymentAction {
    pub payment_id: String,
    pub outcome: PaymentOutcome,
    pub reported_amount_cents: Option<i64>,
}

impl CommandHandler for ConfirmOnlinePaymentAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        // 1. Load payment
        let mut payment = ctx.load_payment(&self.payment_id)?;
        let target = match self.outcome {
            PaymentOutcome::Success => PaymentStatus::Succeeded,
            PaymentOutcome::Failure => PaymentStatus::Failed,
        };

        // 2. Already settled
        if payment.status.is_final() {
            if payment.status == target {
                tracing::debug!(payment_id = %payment.payment_id, "Duplicate payment notification");
                return Ok(CommandReply::Payment(payment));
            }
            return Err(OrderError::InvalidTransition {
                entity: "payment",
                from: format!("{:?}", payment.status).to_lowercase(),
                action: "confirm",
            });
        }

        // 3. Gateway must report the amount we asked for
        if let Some(reported) = self.reported_amount_cents
            && reported != payment.amount_cents
        {
            return Err(OrderError::AmountMismatch {
                expected: payment.amount_cents,
                actual: reported,
            });
        }

        let mut bill = ctx.load_bill(&payment.bill_id)?;
        match self.outcome {
            PaymentOutcome::Success => {
                if bill.status == BillStatus::Paid {
                    return Err(OrderError::BillAlreadyPaid(bill.bill_id));
                }
                if !bill.status.is_payable() {
                    return Err(OrderError::transition("bill", bill.status, "confirm payment of"));
                }
                payment.status = PaymentStatus::Succeeded;
                payment.completed_at = Some(metadata.timestamp);
                ctx.save_payment(&payment)?;
                settle_bill(ctx, bill, PaymentMethod::Online, metadata.timestamp)?;
            }
            PaymentOutcome::Failure => {
                payment.status = PaymentStatus::Failed;
                payment.completed_at = Some(metadata.timestamp);
                ctx.save_payment(&payment)?;

                tracing::warn!(
                    payment_id = %payment.payment_id,
                    bill_id = %bill.bill_id,
                    "Online payment failed"
                );

                // PAYMENT_PENDING -> REQUESTED so the customer can retry, unless
                // another attempt on the bill is still in flight
                let in_flight = ctx
                    .bill_payments(&bill.bill_id)?
                    .iter()
                    .any(|p| p.payment_id != payment.payment_id && !p.status.is_final());
                if in_flight {
                    tracing::info!(
                        bill_id = %bill.bill_id,
                        "Bill stays payment_pending, another attempt is in flight"
                    );
                } else if bill.status == BillStatus::PaymentPending {
                    bill.status = BillStatus::Requested;
                    ctx.save_bill(&bill)?;
                    ctx.emit(
                        &bill.table_id,
                        &bill.session_id,
                        RealtimeEvent::BillPaymentFailed {
                            bill_id: bill.bill_id.clone(),
                            payment_id: payment.payment_id.clone(),
                            status: bill.status,
                        },
                    );
                }
            }
        }

        Ok(CommandReply::Payment(payment))
    }
}
