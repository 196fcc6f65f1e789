//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /health | GET | 健康检查 + 存储统计 | 无 |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::orders::storage::StorageStats;

pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// ok | degraded
    status: &'static str,
    version: &'static str,
    /// Server instance epoch (same value as the realtime `hello`)
    epoch: String,
    realtime_connections: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage: Option<StorageStats>,
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let storage = match state.manager.storage().get_stats() {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::error!(error = %e, "Health check: storage unavailable");
            None
        }
    };
    Json(HealthResponse {
        status: if storage.is_some() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        epoch: state.manager.epoch().to_string(),
        realtime_connections: state.bus().connection_count(),
        storage,
    })
}
