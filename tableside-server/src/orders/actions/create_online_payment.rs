//! CreateOnlinePayment command handler
//!
//! Creates a pending payment at the live bill total and asks the gateway
//! for a checkout URL. Bill and session move to PAYMENT_PENDING.

use crate::orders::billing;
use crate::orders::command::CommandReply;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use crate::payments::IntentRequest;
use shared::bill::{BillStatus, Payment, PaymentIntent, PaymentProvider, PaymentStatus};
use shared::message::RealtimeEvent;
use shared::session::SessionStatus;
use shared::util::new_id;

use super::load_payable_bill;

/// CreateOnlinePayment action
#[derive(Debug, Clone)]
pub struct CreateOnlinePaymentAction {
    pub bill_id: String,
    pub provider: Option<PaymentProvider>,
    pub amount_cents: Option<i64>,
}

impl CommandHandler for CreateOnlinePaymentAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<CommandReply, OrderError> {
        // 1. Load bill
        let mut bill = load_payable_bill(ctx, &metadata.actor, &self.bill_id, "pay online")?;

        // 2. Amount is always the live total
        let live = billing::session_live_total(ctx.reader(), &bill.session_id)?;
        if live.total_cents <= 0 {
            return Err(OrderError::Validation(
                "Nothing has been served yet; the bill total is zero".to_string(),
            ));
        }
        if let Some(amount) = self.amount_cents
            && amount != live.total_cents
        {
            return Err(OrderError::AmountMismatch {
                expected: live.total_cents,
                actual: amount,
            });
        }

        // 3. Ask the gateway for a checkout URL
        let gateways = ctx.services().gateways;
        let provider = self.provider.unwrap_or_else(|| gateways.default_provider());
        let gateway = gateways
            .get(provider)
            .map_err(|e| OrderError::Gateway(e.to_string()))?;
        let payment_id = new_id();
        let checkout_url = gateway
            .create_intent(&IntentRequest {
                payment_id: &payment_id,
                bill_id: &bill.bill_id,
                amount_cents: live.total_cents,
                table_number: &bill.table_number_snapshot,
                created_at: metadata.timestamp,
            })
            .map_err(|e| OrderError::Gateway(e.to_string()))?;

        let payment = Payment {
            payment_id: payment_id.clone(),
            bill_id: bill.bill_id.clone(),
            provider,
            amount_cents: live.total_cents,
            status: PaymentStatus::Pending,
            checkout_url: checkout_url.clone(),
            created_at: metadata.timestamp,
            completed_at: None,
        };
        ctx.save_payment(&payment)?;

        // 4. Bill -> PAYMENT_PENDING
        if bill.status == BillStatus::Requested {
            bill.status = BillStatus::PaymentPending;
        }
        bill.total_cents = live.total_cents;
        bill.order_ids = live.order_ids;
        ctx.save_bill(&bill)?;

        // 5. Session BILL_REQUESTED -> PAYMENT_PENDING
        let mut session = ctx.load_session(&bill.session_id)?;
        if session.status.can_transition_to(SessionStatus::PaymentPending) {
            session.status = SessionStatus::PaymentPending;
            ctx.save_session(&session)?;
        }

        tracing::info!(
            payment_id = %payment_id,
            bill_id = %bill.bill_id,
            provider = ?provider,
            amount_cents = payment.amount_cents,
            "Online payment created"
        );

        ctx.emit(
            &bill.table_id,
            &bill.session_id,
            RealtimeEvent::BillPaymentPending {
                bill_id: bill.bill_id.clone(),
                payment_id: payment_id.clone(),
                status: bill.status,
            },
        );

        Ok(CommandReply::PaymentIntent(PaymentIntent {
            payment_id,
            bill_id: bill.bill_id,
            amount_cents: payment.amount_cents,
            checkout_url,
        }))
    }
}
