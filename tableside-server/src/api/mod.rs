//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`public`] - 顾客端接口 (`?table=&token=`)
//! - [`staff`] - 员工端接口 (Bearer JWT)
//! - [`webhooks`] - 支付网关回调
//! - 实时推送: [`crate::message::ws`]
//!
//! Every mutating route runs exactly one `DiningCommand`; an
//! `Idempotency-Key` header becomes the command id so retries replay the
//! recorded reply instead of executing twice.

pub mod health;
pub mod public;
pub mod staff;
pub mod webhooks;

use axum::{Router, http::HeaderMap, middleware};
use http::HeaderName;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::core::ServerState;
use crate::orders::{Actor, CommandPayload, CommandReply, DiningCommand};
use crate::utils::validation::MAX_COMMAND_ID_LEN;
use crate::utils::{AppError, AppResult};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP 请求日志中间件
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let status = response.status();

    tracing::info!(target: "http_access", "{} {} {}", method, uri, status);

    response
}

/// uuid v4 request ids
#[derive(Clone, Copy, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        http::HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Build the Axum router (without state)
pub fn build_router() -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(health::router())
        .merge(public::router())
        .merge(staff::router())
        .merge(webhooks::router())
        .merge(crate::message::ws::router())
}

/// Router with state and the tower-http stack applied
pub fn build_app(state: ServerState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    build_router()
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

/// `Idempotency-Key` header, validated
pub fn idempotency_key(headers: &HeaderMap) -> AppResult<Option<String>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map_err(|_| AppError::validation("Idempotency-Key must be visible ASCII"))?
        .trim();
    if key.is_empty() || key.len() > MAX_COMMAND_ID_LEN {
        return Err(AppError::validation(format!(
            "Idempotency-Key must be 1..={MAX_COMMAND_ID_LEN} characters"
        )));
    }
    Ok(Some(key.to_string()))
}

/// Run one command on the manager
pub fn execute(
    state: &ServerState,
    actor: Actor,
    payload: CommandPayload,
    command_id: Option<String>,
) -> AppResult<CommandReply> {
    let cmd = DiningCommand::new(actor, payload).with_command_id(command_id);
    Ok(state.manager.execute(cmd)?)
}
