//! HTTP request / response bodies shared by server and client

use crate::bill::PaymentProvider;
use crate::order::{CartLineInput, OrderStatus};
use serde::{Deserialize, Serialize};

/// Customer credential carried as `?table=&token=`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableAccess {
    pub table: String,
    pub token: String,
}

/// Draft order bootstrap (`GET /public/orders/open-session`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DraftOrderHandle {
    pub order_id: String,
    pub session_id: String,
    pub session_key: String,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateDraftItemsRequest {
    pub items: Vec<CartLineInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestBillRequest {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    /// Defaults to the server's configured provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<PaymentProvider>,
    /// Defaults to the live bill total; must equal it when given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_cents: Option<i64>,
}

/// Staff order board filter
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StaffOrderQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

/// Staff bill board tabs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillTab {
    /// REQUESTED or PAYMENT_PENDING
    #[default]
    Requested,
    /// PAID, session still open
    Paid,
    /// PAID and session closed
    Done,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StaffBillQuery {
    #[serde(default)]
    pub tab: BillTab,
}

/// QR payload for a table (`GET /staff/tables/{id}/qr`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableQr {
    pub table_id: String,
    pub table_number: String,
    pub token: String,
    pub epoch: u64,
    pub url: String,
}

/// Result of verifying a gateway return redirect. Never mutates state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReturnResult {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<String>,
    /// Gateway reported success (confirmation still arrives via IPN)
    pub success: bool,
}
