//! Staff API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use shared::bill::Bill;
use shared::dto::{StaffBillQuery, StaffOrderQuery, TableQr};
use shared::error::ApiResponse;
use shared::order::Order;
use shared::session::{Session, TableInfo};

use crate::api::{execute, idempotency_key};
use crate::auth::{CurrentUser, StaffAction};
use crate::core::ServerState;
use crate::orders::{Actor, CommandPayload};
use crate::utils::{AppResult, ok};

type ApiResult<T> = AppResult<Json<ApiResponse<T>>>;

fn actor(user: &CurrentUser) -> Actor {
    Actor::Staff {
        id: user.id.clone(),
        role: user.role,
    }
}

/// Permission check + command returning the updated order
fn order_command(
    state: &ServerState,
    user: &CurrentUser,
    action: StaffAction,
    payload: CommandPayload,
    headers: &HeaderMap,
) -> ApiResult<Order> {
    user.require(action)?;
    let order = execute(state, actor(user), payload, idempotency_key(headers)?)?.into_order()?;
    Ok(ok(order))
}

// ========== Orders ==========

/// GET /api/staff/orders?status=
pub async fn list_orders(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<StaffOrderQuery>,
) -> ApiResult<Vec<Order>> {
    user.require(StaffAction::ViewOrders)?;
    Ok(ok(state.manager.staff_orders(query.status)?))
}

pub async fn get_order(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    user.require(StaffAction::ViewOrders)?;
    Ok(ok(state.manager.get_order(&id)?))
}

pub async fn accept_order(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Order> {
    let payload = CommandPayload::AcceptOrder { order_id: id };
    order_command(&state, &user, StaffAction::AcceptOrder, payload, &headers)
}

pub async fn reject_order(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Order> {
    let payload = CommandPayload::RejectOrder { order_id: id };
    order_command(&state, &user, StaffAction::RejectOrder, payload, &headers)
}

/// 整单开始制作
pub async fn start_order(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Order> {
    let payload = CommandPayload::StartOrder { order_id: id };
    order_command(&state, &user, StaffAction::StartOrder, payload, &headers)
}

pub async fn send_to_waiter(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Order> {
    let payload = CommandPayload::SendToWaiter { order_id: id };
    order_command(&state, &user, StaffAction::SendToWaiter, payload, &headers)
}

pub async fn mark_served(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Order> {
    let payload = CommandPayload::MarkServed { order_id: id };
    order_command(&state, &user, StaffAction::MarkServed, payload, &headers)
}

// ========== Lines ==========

pub async fn start_line(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path((id, line_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Order> {
    let payload = CommandPayload::StartLine {
        order_id: id,
        line_id,
    };
    order_command(&state, &user, StaffAction::StartLine, payload, &headers)
}

pub async fn ready_line(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path((id, line_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Order> {
    let payload = CommandPayload::ReadyLine {
        order_id: id,
        line_id,
    };
    order_command(&state, &user, StaffAction::ReadyLine, payload, &headers)
}

pub async fn cancel_line(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path((id, line_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Order> {
    let payload = CommandPayload::CancelLine {
        order_id: id,
        line_id,
    };
    order_command(&state, &user, StaffAction::CancelLine, payload, &headers)
}

// ========== Bills ==========

/// GET /api/staff/bills?tab=REQUESTED|PAID|DONE
pub async fn list_bills(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<StaffBillQuery>,
) -> ApiResult<Vec<Bill>> {
    user.require(StaffAction::ViewBills)?;
    Ok(ok(state.manager.staff_bills(query.tab)?))
}

/// 服务员确认现金收款
pub async fn mark_cash_paid(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Bill> {
    user.require(StaffAction::MarkCashPaid)?;
    let payload = CommandPayload::PayCash { bill_id: id };
    let bill = execute(&state, actor(&user), payload, idempotency_key(&headers)?)?.into_bill()?;
    Ok(ok(bill))
}

/// 关闭会话并轮换桌台令牌
pub async fn accept_bill(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Session> {
    user.require(StaffAction::AcceptBill)?;
    let payload = CommandPayload::AcceptBill { bill_id: id };
    let session =
        execute(&state, actor(&user), payload, idempotency_key(&headers)?)?.into_session()?;
    Ok(ok(session))
}

// ========== Tables ==========

pub async fn list_tables(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> ApiResult<Vec<TableInfo>> {
    user.require(StaffAction::IssueTableToken)?;
    Ok(ok(state.manager.list_tables()?))
}

/// GET /api/staff/tables/{id}/qr - 当前 epoch 的二维码内容
pub async fn table_qr(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<TableQr> {
    user.require(StaffAction::IssueTableToken)?;
    let (table, token) = state.manager.table_token(&id)?;
    tracing::info!(table_id = %table.table_id, epoch = table.token_epoch, issued_by = %user.id, "Table QR issued");
    Ok(ok(TableQr {
        url: state.config.table_url(&table.table_id, &token),
        table_id: table.table_id,
        table_number: table.table_number,
        token,
        epoch: table.token_epoch,
    }))
}
