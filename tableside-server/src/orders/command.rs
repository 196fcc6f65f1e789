//! Commands accepted by the [`DiningManager`](super::manager::DiningManager)

use serde::{Deserialize, Serialize};
use shared::bill::{Bill, Payment, PaymentIntent, PaymentOutcome, PaymentProvider};
use shared::dto::DraftOrderHandle;
use shared::order::{CartLineInput, Order};
use shared::session::{Session, TableInfo};
use shared::util::{new_id, now_millis};

use super::manager::{ManagerError, ManagerResult};
use super::traits::Actor;

/// Command envelope
#[derive(Debug, Clone)]
pub struct DiningCommand {
    /// Idempotency key; replays return the recorded reply
    pub command_id: String,
    /// The id came from the caller (Idempotency-Key header, webhook id).
    /// Only keyed commands are recorded; a generated id is never retried.
    pub keyed: bool,
    pub actor: Actor,
    pub timestamp: i64,
    pub payload: CommandPayload,
}

impl DiningCommand {
    pub fn new(actor: Actor, payload: CommandPayload) -> Self {
        Self {
            command_id: new_id(),
            keyed: false,
            actor,
            timestamp: now_millis(),
            payload,
        }
    }

    /// Use a caller-supplied idempotency key when present
    pub fn with_command_id(mut self, command_id: Option<String>) -> Self {
        if let Some(id) = command_id {
            self.command_id = id;
            self.keyed = true;
        }
        self
    }
}

/// Command payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandPayload {
    // ========== Session ==========
    OpenSession {
        table_id: String,
        token: String,
    },
    OpenDraftOrder {
        table_id: String,
        token: String,
    },
    RequestBill {
        session_id: String,
        note: Option<String>,
    },

    // ========== Order ==========
    UpdateDraftItems {
        order_id: String,
        items: Vec<CartLineInput>,
    },
    SubmitOrder {
        order_id: String,
        order_note: Option<String>,
    },
    AcceptOrder {
        order_id: String,
    },
    RejectOrder {
        order_id: String,
    },
    StartOrder {
        order_id: String,
    },
    StartLine {
        order_id: String,
        line_id: String,
    },
    ReadyLine {
        order_id: String,
        line_id: String,
    },
    CancelLine {
        order_id: String,
        line_id: String,
    },
    SendToWaiter {
        order_id: String,
    },
    MarkServed {
        order_id: String,
    },

    // ========== Bill / Payment ==========
    PayCash {
        bill_id: String,
    },
    CreateOnlinePayment {
        bill_id: String,
        provider: Option<PaymentProvider>,
        amount_cents: Option<i64>,
    },
    ConfirmOnlinePayment {
        payment_id: String,
        outcome: PaymentOutcome,
        /// Amount reported by the gateway, checked against the intent
        reported_amount_cents: Option<i64>,
    },
    AcceptBill {
        bill_id: String,
    },

    // ========== Tables ==========
    RegisterTable {
        table_id: String,
        table_number: String,
    },
}

impl CommandPayload {
    pub fn name(&self) -> &'static str {
        match self {
            CommandPayload::OpenSession { .. } => "open_session",
            CommandPayload::OpenDraftOrder { .. } => "open_draft_order",
            CommandPayload::RequestBill { .. } => "request_bill",
            CommandPayload::UpdateDraftItems { .. } => "update_draft_items",
            CommandPayload::SubmitOrder { .. } => "submit_order",
            CommandPayload::AcceptOrder { .. } => "accept_order",
            CommandPayload::RejectOrder { .. } => "reject_order",
            CommandPayload::StartOrder { .. } => "start_order",
            CommandPayload::StartLine { .. } => "start_line",
            CommandPayload::ReadyLine { .. } => "ready_line",
            CommandPayload::CancelLine { .. } => "cancel_line",
            CommandPayload::SendToWaiter { .. } => "send_to_waiter",
            CommandPayload::MarkServed { .. } => "mark_served",
            CommandPayload::PayCash { .. } => "pay_cash",
            CommandPayload::CreateOnlinePayment { .. } => "create_online_payment",
            CommandPayload::ConfirmOnlinePayment { .. } => "confirm_online_payment",
            CommandPayload::AcceptBill { .. } => "accept_bill",
            CommandPayload::RegisterTable { .. } => "register_table",
        }
    }
}

/// Command result; recorded verbatim for idempotent replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CommandReply {
    Session(Session),
    DraftOrder(DraftOrderHandle),
    Order(Order),
    Bill(Bill),
    PaymentIntent(PaymentIntent),
    Payment(Payment),
    Table(TableInfo),
}

impl CommandReply {
    fn kind(&self) -> &'static str {
        match self {
            CommandReply::Session(_) => "session",
            CommandReply::DraftOrder(_) => "draft_order",
            CommandReply::Order(_) => "order",
            CommandReply::Bill(_) => "bill",
            CommandReply::PaymentIntent(_) => "payment_intent",
            CommandReply::Payment(_) => "payment",
            CommandReply::Table(_) => "table",
        }
    }

    fn mismatch(self, expected: &str) -> ManagerError {
        ManagerError::Internal(format!(
            "Expected {expected} reply, got {}",
            self.kind()
        ))
    }

    pub fn into_session(self) -> ManagerResult<Session> {
        match self {
            CommandReply::Session(s) => Ok(s),
            other => Err(other.mismatch("session")),
        }
    }

    pub fn into_draft_order(self) -> ManagerResult<DraftOrderHandle> {
        match self {
            CommandReply::DraftOrder(d) => Ok(d),
            other => Err(other.mismatch("draft_order")),
        }
    }

    pub fn into_order(self) -> ManagerResult<Order> {
        match self {
            CommandReply::Order(o) => Ok(o),
            other => Err(other.mismatch("order")),
        }
    }

    pub fn into_bill(self) -> ManagerResult<Bill> {
        match self {
            CommandReply::Bill(b) => Ok(b),
            other => Err(other.mismatch("bill")),
        }
    }

    pub fn into_payment_intent(self) -> ManagerResult<PaymentIntent> {
        match self {
            CommandReply::PaymentIntent(p) => Ok(p),
            other => Err(other.mismatch("payment_intent")),
        }
    }

    pub fn into_payment(self) -> ManagerResult<Payment> {
        match self {
            CommandReply::Payment(p) => Ok(p),
            other => Err(other.mismatch("payment")),
        }
    }

    pub fn into_table(self) -> ManagerResult<TableInfo> {
        match self {
            CommandReply::Table(t) => Ok(t),
            other => Err(other.mismatch("table")),
        }
    }
}
