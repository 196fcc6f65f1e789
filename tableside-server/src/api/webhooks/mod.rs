//! Payment gateway callbacks
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/webhooks/mock-payments/{id}/success | POST | mock 支付成功 |
//! | /api/webhooks/mock-payments/{id}/fail | POST | mock 支付失败 |
//! | /api/webhooks/signed-redirect/ipn | GET | 签名网关服务端通知 |
//! | /mock-pay/{id} | GET | mock 收银页 |
//!
//! Confirmation is the only path that moves a bill to PAID online.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .nest("/api/webhooks", routes())
        .route("/mock-pay/{id}", get(handler::mock_checkout_page))
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/mock-payments/{id}/success", post(handler::mock_success))
        .route("/mock-payments/{id}/fail", post(handler::mock_fail))
        .route("/signed-redirect/ipn", get(handler::signed_redirect_ipn))
}
