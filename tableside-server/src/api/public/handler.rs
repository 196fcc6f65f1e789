//! Customer API Handlers

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use shared::bill::{ActiveBillView, Bill, Payment, PaymentIntent, PaymentOutcome, PaymentProvider};
use shared::dto::{
    CreatePaymentRequest, DraftOrderHandle, PaymentReturnResult, RequestBillRequest,
    SubmitOrderRequest, UpdateDraftItemsRequest,
};
use shared::error::{ApiResponse, ErrorCode};
use shared::order::Order;
use shared::session::Session;

use crate::api::{execute, idempotency_key};
use crate::auth::CustomerTable;
use crate::core::ServerState;
use crate::orders::{Actor, CommandPayload};
use crate::security_log;
use crate::utils::{AppError, AppResult, ok};

type ApiResult<T> = AppResult<Json<ApiResponse<T>>>;

fn actor(access: &CustomerTable) -> Actor {
    Actor::Customer {
        table_id: access.table_id().to_string(),
    }
}

// ========== Session ==========

/// GET /api/public/sessions/open - 打开或复用本桌会话
pub async fn open_session(
    State(state): State<ServerState>,
    access: CustomerTable,
) -> ApiResult<Session> {
    let payload = CommandPayload::OpenSession {
        table_id: access.table_id().to_string(),
        token: access.token.clone(),
    };
    let session = execute(&state, actor(&access), payload, None)?.into_session()?;
    Ok(ok(session))
}

/// GET /api/public/sessions/active - 当前会话 (可能没有)
pub async fn active_session(
    State(state): State<ServerState>,
    access: CustomerTable,
) -> ApiResult<Option<Session>> {
    Ok(ok(state.manager.active_session(access.table_id())?))
}

// ========== Orders ==========

/// GET /api/public/orders/open-session - 会话 + 草稿订单
pub async fn open_draft_order(
    State(state): State<ServerState>,
    access: CustomerTable,
) -> ApiResult<DraftOrderHandle> {
    let payload = CommandPayload::OpenDraftOrder {
        table_id: access.table_id().to_string(),
        token: access.token.clone(),
    };
    let handle = execute(&state, actor(&access), payload, None)?.into_draft_order()?;
    Ok(ok(handle))
}

/// GET /api/public/orders - 本次会话已提交的订单
pub async fn list_orders(
    State(state): State<ServerState>,
    access: CustomerTable,
) -> ApiResult<Vec<Order>> {
    Ok(ok(state.manager.list_session_orders(access.table_id())?))
}

pub async fn get_order(
    State(state): State<ServerState>,
    access: CustomerTable,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    Ok(ok(state.manager.get_order_for_table(access.table_id(), &id)?))
}

/// POST /api/public/orders/{id}/items - 替换草稿行
pub async fn update_items(
    State(state): State<ServerState>,
    access: CustomerTable,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateDraftItemsRequest>,
) -> ApiResult<Order> {
    let payload = CommandPayload::UpdateDraftItems {
        order_id: id,
        items: req.items,
    };
    let order = execute(&state, actor(&access), payload, idempotency_key(&headers)?)?
        .into_order()?;
    Ok(ok(order))
}

/// POST /api/public/orders/{id}/submit
pub async fn submit_order(
    State(state): State<ServerState>,
    access: CustomerTable,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SubmitOrderRequest>,
) -> ApiResult<Order> {
    let payload = CommandPayload::SubmitOrder {
        order_id: id,
        order_note: req.order_note,
    };
    let order = execute(&state, actor(&access), payload, idempotency_key(&headers)?)?
        .into_order()?;
    Ok(ok(order))
}

// ========== Bills ==========

/// POST /api/public/bills/request - 请求结账 (幂等)
pub async fn request_bill(
    State(state): State<ServerState>,
    access: CustomerTable,
    headers: HeaderMap,
    Json(req): Json<RequestBillRequest>,
) -> ApiResult<Bill> {
    let payload = CommandPayload::RequestBill {
        session_id: req.session_id,
        note: req.note,
    };
    let bill = execute(&state, actor(&access), payload, idempotency_key(&headers)?)?
        .into_bill()?;
    Ok(ok(bill))
}

/// GET /api/public/bills/active - 账单 + 已上菜明细 (同一快照)
pub async fn active_bill(
    State(state): State<ServerState>,
    access: CustomerTable,
) -> ApiResult<ActiveBillView> {
    Ok(ok(state.manager.active_bill_view(access.table_id())?))
}

pub async fn pay_cash(
    State(state): State<ServerState>,
    access: CustomerTable,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Bill> {
    let payload = CommandPayload::PayCash { bill_id: id };
    let bill = execute(&state, actor(&access), payload, idempotency_key(&headers)?)?
        .into_bill()?;
    Ok(ok(bill))
}

/// POST /api/public/bills/{id}/payments - 创建在线支付
pub async fn create_payment(
    State(state): State<ServerState>,
    access: CustomerTable,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CreatePaymentRequest>,
) -> ApiResult<PaymentIntent> {
    let payload = CommandPayload::CreateOnlinePayment {
        bill_id: id,
        provider: req.provider,
        amount_cents: req.amount_cents,
    };
    let intent = execute(&state, actor(&access), payload, idempotency_key(&headers)?)?
        .into_payment_intent()?;
    Ok(ok(intent))
}

// ========== Payments ==========

pub async fn get_payment(
    State(state): State<ServerState>,
    access: CustomerTable,
    Path(id): Path<String>,
) -> ApiResult<Payment> {
    Ok(ok(state.manager.get_payment_for_table(access.table_id(), &id)?))
}

/// GET /api/public/payments/return - 网关跳转回来的参数校验
///
/// Only verifies the signature; the bill changes state when the IPN arrives.
pub async fn payment_return(
    State(state): State<ServerState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> ApiResult<PaymentReturnResult> {
    let provider = if params.keys().any(|k| k.starts_with("vnp_")) {
        PaymentProvider::SignedRedirect
    } else {
        PaymentProvider::Mock
    };
    let gateway = state
        .manager
        .gateways()
        .get(provider)
        .map_err(|e| AppError::with_message(ErrorCode::GatewayError, e.to_string()))?;
    let callback = gateway
        .verify_callback(&params)
        .map_err(|e| AppError::validation(e.to_string()))?;

    if !callback.verified {
        security_log!(
            "WARN",
            "payment_return_signature_invalid",
            payment_id = callback.payment_id.clone().unwrap_or_default()
        );
    }

    Ok(ok(PaymentReturnResult {
        verified: callback.verified,
        success: callback.verified && callback.outcome == Some(PaymentOutcome::Success),
        payment_id: callback.payment_id,
        response_code: callback.response_code,
    }))
}
