//! Command action implementations
//!
//! Each action implements the `CommandHandler` trait and handles
//! one specific command type. Dispatch goes through `enum_dispatch`.

use enum_dispatch::enum_dispatch;

use crate::orders::billing;
use crate::orders::command::{CommandPayload, CommandReply};
use crate::orders::traits::{Actor, CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::bill::{Bill, BillStatus, PaymentMethod};
use shared::message::RealtimeEvent;
use shared::order::{LineStatus, Order, OrderStatus};
use shared::session::{Session, SessionStatus};
use shared::util::monotonic_stamp;

mod accept_bill;
mod accept_order;
mod cancel_line;
mod confirm_online_payment;
mod create_online_payment;
mod mark_served;
mod open_session;
mod pay_cash;
mod ready_line;
mod register_table;
mod reject_order;
mod request_bill;
mod send_to_waiter;
mod start_line;
mod submit_order;
mod update_draft_items;

pub use accept_bill::AcceptBillAction;
pub use accept_order::AcceptOrderAction;
pub use cancel_line::CancelLineAction;
pub use confirm_online_payment::ConfirmOnlinePaymentAction;
pub use create_online_payment::CreateOnlinePaymentAction;
pub use mark_served::MarkServedAction;
pub use open_session::{OpenDraftOrderAction, OpenSessionAction};
pub use pay_cash::PayCashAction;
pub use ready_line::ReadyLineAction;
pub use register_table::RegisterTableAction;
pub use reject_order::RejectOrderAction;
pub use request_bill::RequestBillAction;
pub use send_to_waiter::SendToWaiterAction;
pub use start_line::{StartLineAction, StartOrderAction};
pub use submit_order::SubmitOrderAction;
pub use update_draft_items::UpdateDraftItemsAction;

/// CommandAction enum - dispatches to concrete action implementations
#[enum_dispatch(CommandHandler)]
pub enum CommandAction {
    OpenSession(OpenSessionAction),
    OpenDraftOrder(OpenDraftOrderAction),
    RequestBill(RequestBillAction),
    UpdateDraftItems(UpdateDraftItemsAction),
    SubmitOrder(SubmitOrderAction),
    AcceptOrder(AcceptOrderAction),
    RejectOrder(RejectOrderAction),
    StartOrder(StartOrderAction),
    StartLine(StartLineAction),
    ReadyLine(ReadyLineAction),
    CancelLine(CancelLineAction),
    SendToWaiter(SendToWaiterAction),
    MarkServed(MarkServedAction),
    PayCash(PayCashAction),
    CreateOnlinePayment(CreateOnlinePaymentAction),
    ConfirmOnlinePayment(ConfirmOnlinePaymentAction),
    AcceptBill(AcceptBillAction),
    RegisterTable(RegisterTableAction),
}

/// Convert CommandPayload to CommandAction
impl From<&CommandPayload> for CommandAction {
    fn from(payload: &CommandPayload) -> Self {
        match payload {
            CommandPayload::OpenSession { table_id, token } => {
                CommandAction::OpenSession(OpenSessionAction {
                    table_id: table_id.clone(),
                    token: token.clone(),
                })
            }
            CommandPayload::OpenDraftOrder { table_id, token } => {
                CommandAction::OpenDraftOrder(OpenDraftOrderAction {
                    table_id: table_id.clone(),
                    token: token.clone(),
                })
            }
            CommandPayload::RequestBill { session_id, note } => {
                CommandAction::RequestBill(RequestBillAction {
                    session_id: session_id.clone(),
                    note: note.clone(),
                })
            }
            CommandPayload::UpdateDraftItems { order_id, items } => {
                CommandAction::UpdateDraftItems(UpdateDraftItemsAction {
                    order_id: order_id.clone(),
                    items: items.clone(),
                })
            }
            CommandPayload::SubmitOrder {
                order_id,
                order_note,
            } => CommandAction::SubmitOrder(SubmitOrderAction {
                order_id: order_id.clone(),
                order_note: order_note.clone(),
            }),
            CommandPayload::AcceptOrder { order_id } => {
                CommandAction::AcceptOrder(AcceptOrderAction {
                    order_id: order_id.clone(),
                })
            }
            CommandPayload::RejectOrder { order_id } => {
                CommandAction::RejectOrder(RejectOrderAction {
                    order_id: order_id.clone(),
                })
            }
            CommandPayload::StartOrder { order_id } => CommandAction::StartOrder(StartOrderAction {
                order_id: order_id.clone(),
            }),
            CommandPayload::StartLine { order_id, line_id } => {
                CommandAction::StartLine(StartLineAction {
                    order_id: order_id.clone(),
                    line_id: line_id.clone(),
                })
            }
            CommandPayload::ReadyLine { order_id, line_id } => {
                CommandAction::ReadyLine(ReadyLineAction {
                    order_id: order_id.clone(),
                    line_id: line_id.clone(),
                })
            }
            CommandPayload::CancelLine { order_id, line_id } => {
                CommandAction::CancelLine(CancelLineAction {
                    order_id: order_id.clone(),
                    line_id: line_id.clone(),
                })
            }
            CommandPayload::SendToWaiter { order_id } => {
                CommandAction::SendToWaiter(SendToWaiterAction {
                    order_id: order_id.clone(),
                })
            }
            CommandPayload::MarkServed { order_id } => CommandAction::MarkServed(MarkServedAction {
                order_id: order_id.clone(),
            }),
            CommandPayload::PayCash { bill_id } => CommandAction::PayCash(PayCashAction {
                bill_id: bill_id.clone(),
            }),
            CommandPayload::CreateOnlinePayment {
                bill_id,
                provider,
                amount_cents,
            } => CommandAction::CreateOnlinePayment(CreateOnlinePaymentAction {
                bill_id: bill_id.clone(),
                provider: *provider,
                amount_cents: *amount_cents,
            }),
            CommandPayload::ConfirmOnlinePayment {
                payment_id,
                outcome,
                reported_amount_cents,
            } => CommandAction::ConfirmOnlinePayment(ConfirmOnlinePaymentAction {
                payment_id: payment_id.clone(),
                outcome: *outcome,
                reported_amount_cents: *reported_amount_cents,
            }),
            CommandPayload::AcceptBill { bill_id } => CommandAction::AcceptBill(AcceptBillAction {
                bill_id: bill_id.clone(),
            }),
            CommandPayload::RegisterTable {
                table_id,
                table_number,
            } => CommandAction::RegisterTable(RegisterTableAction {
                table_id: table_id.clone(),
                table_number: table_number.clone(),
            }),
        }
    }
}

// ========== Shared helpers ==========

/// Load an order the actor is allowed to touch
pub(super) fn load_order_for(
    ctx: &CommandContext<'_>,
    actor: &Actor,
    order_id: &str,
) -> Result<Order, OrderError> {
    let order = ctx.load_order(order_id)?;
    actor.ensure_table(&order.table_id)?;
    Ok(order)
}

/// Order must be with the kitchen (accepted phase, not yet sent out)
pub(super) fn ensure_kitchen_phase(order: &Order, action: &'static str) -> Result<(), OrderError> {
    match order.status {
        OrderStatus::Accepted | OrderStatus::Preparing | OrderStatus::Ready => Ok(()),
        other => Err(OrderError::transition("order", other, action)),
    }
}

/// Move one line along its edge table
pub(super) fn transition_line(
    order: &mut Order,
    line_id: &str,
    next: LineStatus,
    action: &'static str,
    now: i64,
) -> Result<(), OrderError> {
    let order_id = order.order_id.clone();
    let line = order
        .line_mut(line_id)
        .ok_or_else(|| OrderError::LineNotFound {
            order_id,
            line_id: line_id.to_string(),
        })?;
    if !line.status.can_transition_to(next) {
        return Err(OrderError::transition("line", line.status, action));
    }
    line.status = next;
    match next {
        LineStatus::Preparing => line.started_at = Some(now),
        LineStatus::Ready => line.ready_at = Some(now),
        LineStatus::Served => {
            line.served_at.get_or_insert(now);
        }
        LineStatus::Cancelled => line.cancelled_at = Some(now),
        LineStatus::Queued => {}
    }
    Ok(())
}

/// Stage `order.line_status_changed` per changed line, then
/// `order.status_changed` when the derived status moved.
pub(super) fn emit_line_changes(
    ctx: &mut CommandContext<'_>,
    order: &Order,
    changed_lines: &[String],
    status_before: OrderStatus,
) {
    for line_id in changed_lines {
        if let Some(line) = order.line(line_id) {
            ctx.emit(
                &order.table_id,
                &order.session_id,
                RealtimeEvent::OrderLineStatusChanged {
                    order_id: order.order_id.clone(),
                    line_id: line.line_id.clone(),
                    status: line.status,
                    order_status: Some(order.status),
                },
            );
        }
    }
    if order.status != status_before {
        emit_status_changed(ctx, order);
    }
}

pub(super) fn emit_status_changed(ctx: &mut CommandContext<'_>, order: &Order) {
    ctx.emit(
        &order.table_id,
        &order.session_id,
        RealtimeEvent::OrderStatusChanged {
            order_id: order.order_id.clone(),
            status: order.status,
        },
    );
}

/// Load a bill the actor may pay.
///
/// Customers may only touch the bill of their table's current session.
pub(super) fn load_payable_bill(
    ctx: &CommandContext<'_>,
    actor: &Actor,
    bill_id: &str,
    action: &'static str,
) -> Result<Bill, OrderError> {
    let bill = ctx.load_bill(bill_id)?;
    if let Actor::Customer { table_id } = actor {
        actor.ensure_table(&bill.table_id)?;
        let current = ctx.active_session(table_id)?;
        if current.map(|s| s.session_id).as_deref() != Some(bill.session_id.as_str()) {
            return Err(OrderError::SessionMismatch(format!(
                "Bill {bill_id} does not belong to the current session"
            )));
        }
    }
    match bill.status {
        BillStatus::Paid => Err(OrderError::BillAlreadyPaid(bill_id.to_string())),
        status if status.is_payable() => Ok(bill),
        status => Err(OrderError::transition("bill", status, action)),
    }
}

/// Settle a payable bill: freeze the live total, mark bill and session
/// PAID, stage `bill.paid`.
pub(super) fn settle_bill(
    ctx: &mut CommandContext<'_>,
    mut bill: Bill,
    method: PaymentMethod,
    now: i64,
) -> Result<Bill, OrderError> {
    let mut session: Session = ctx.load_session(&bill.session_id)?;
    if !session.status.can_transition_to(SessionStatus::Paid) {
        return Err(OrderError::transition("session", session.status, "mark paid"));
    }
    if !bill.status.can_transition_to(BillStatus::Paid) {
        return Err(OrderError::transition("bill", bill.status, "mark paid"));
    }

    let live = billing::session_live_total(ctx.reader(), &bill.session_id)?;
    let paid_at = monotonic_stamp(Some(session.last_stamp().max(bill.requested_at)), now);

    bill.status = BillStatus::Paid;
    bill.method = Some(method);
    bill.total_cents = live.total_cents;
    bill.order_ids = live.order_ids;
    bill.paid_at = Some(paid_at);

    session.status = SessionStatus::Paid;
    session.paid_at = Some(paid_at);

    ctx.save_bill(&bill)?;
    ctx.save_session(&session)?;

    tracing::info!(
        bill_id = %bill.bill_id,
        session_id = %session.session_id,
        method = ?method,
        total_cents = bill.total_cents,
        "Bill paid"
    );

    ctx.emit(
        &bill.table_id,
        &bill.session_id,
        RealtimeEvent::BillPaid {
            bill_id: bill.bill_id.clone(),
            status: bill.status,
            method,
            paid_at,
            total_cents: bill.total_cents,
        },
    );
    Ok(bill)
}

/// Order reply helper
pub(super) fn order_reply(order: Order) -> CommandReply {
    CommandReply::Order(order)
}
