//! Realtime WebSocket endpoint
//!
//! `GET /api/ws?table=&token=` joins `table:{id}`; staff connect with a JWT
//! (`Authorization: Bearer` or `?access_token=`) and join `staff:{role}`.
//!
//! Every connection first receives `hello{protocolVersion, epoch, sequence}`,
//! then the bus messages its channel may see. There is no catch-up: a client
//! that reconnects or receives `resync` re-fetches over HTTP.
//!
//! A customer connection is only as good as the QR token it was opened with.
//! Closing a session rotates the table's token, so the server forwards
//! `session.closed` and then closes the socket; the next table session is
//! never visible to the old token.

use axum::{
    Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, Uri},
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::dto::TableAccess;
use shared::error::AppError;
use shared::message::{BusMessage, ChannelKey, PROTOCOL_VERSION, RealtimeEvent, ServerFrame};
use shared::util::new_id;
use tokio::sync::broadcast;

use crate::auth::{JwtService, authenticate_staff, authorize_customer};
use crate::core::ServerState;

const PING_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

/// Connection query: customer credential or staff token
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    pub table: Option<String>,
    pub token: Option<String>,
    pub access_token: Option<String>,
}

/// Channel a connection may join
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGrant {
    pub channel: ChannelKey,
    /// Table token epoch a customer grant was issued under
    pub table_epoch: Option<u64>,
}

impl ChannelGrant {
    fn staff(channel: ChannelKey) -> Self {
        Self {
            channel,
            table_epoch: None,
        }
    }

    /// The token rotated while the socket was being set up
    fn is_stale(&self, state: &ServerState) -> bool {
        let (ChannelKey::Table(table_id), Some(epoch)) = (&self.channel, self.table_epoch) else {
            return false;
        };
        match state.manager.table_info(table_id) {
            Ok(table) => table.token_epoch != epoch,
            Err(_) => true,
        }
    }

    /// Customer grants end with the table session
    fn ends_with(&self, msg: &BusMessage) -> bool {
        self.table_epoch.is_some() && matches!(msg.event, RealtimeEvent::SessionClosed { .. })
    }
}

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/ws", get(handle_ws))
}

/// GET /api/ws - upgrade after authenticating the channel
pub async fn handle_ws(
    State(state): State<ServerState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    uri: Uri,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let grant = resolve_channel(&state, query, &headers, &uri)?;
    Ok(ws.on_upgrade(move |socket| ws_session(socket, state, grant)))
}

/// Which channel the caller may join
pub fn resolve_channel(
    state: &ServerState,
    query: WsQuery,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<ChannelGrant, AppError> {
    if let (Some(table), Some(token)) = (query.table, query.token) {
        let table = authorize_customer(state, &TableAccess { table, token })?;
        return Ok(ChannelGrant {
            channel: ChannelKey::Table(table.table_id),
            table_epoch: Some(table.token_epoch),
        });
    }

    let header_token = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(JwtService::extract_from_header)
        .map(str::to_string);
    let Some(token) = header_token.or(query.access_token) else {
        crate::security_log!("WARN", "ws_auth_missing", uri = format!("{:?}", uri));
        return Err(AppError::not_authenticated());
    };
    let user = authenticate_staff(&state.jwt_service, &token, uri)?;
    Ok(ChannelGrant::staff(ChannelKey::Staff(user.role)))
}

async fn ws_session(socket: WebSocket, state: ServerState, grant: ChannelGrant) {
    let channel = grant.channel.clone();
    let connection_id = new_id();
    let bus = state.manager.bus().clone();
    let shutdown = bus.shutdown_token().clone();
    let (mut sink, mut stream) = socket.split();

    // 先订阅再取序号，hello 之后的事件一个不漏
    let mut rx = bus.subscribe();
    // 升级期间桌台令牌已轮换: 会话已结束，旧令牌不再有效
    if grant.is_stale(&state) {
        tracing::info!(connection_id = %connection_id, channel = %channel, "Table token rotated before subscribe");
        let _ = sink.send(Message::Close(None)).await;
        return;
    }
    let sequence = match state.manager.current_sequence() {
        Ok(sequence) => sequence,
        Err(e) => {
            tracing::error!(connection_id = %connection_id, error = %e, "Cannot read sequence for hello");
            return;
        }
    };
    let hello = ServerFrame::Hello {
        protocol_version: PROTOCOL_VERSION,
        epoch: state.manager.epoch().to_string(),
        sequence,
    };
    if send_frame(&mut sink, &hello).await.is_err() {
        return;
    }

    bus.register_connection(&connection_id, channel.clone());

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // skip immediate tick

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }

            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if !msg.reaches(&channel) {
                            continue;
                        }
                        let last = grant.ends_with(&msg);
                        if send_frame(&mut sink, &ServerFrame::Event(msg)).await.is_err() {
                            break;
                        }
                        if last {
                            tracing::debug!(connection_id = %connection_id, channel = %channel, "Table session closed, ending connection");
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            connection_id = %connection_id,
                            channel = %channel,
                            skipped = n,
                            "Realtime subscriber lagged, requesting resync"
                        );
                        let frame = ServerFrame::Resync {
                            reason: format!("lagged by {n} messages"),
                        };
                        if send_frame(&mut sink, &frame).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                        break;
                    }
                    // 客户端只收不发，其他帧忽略 (pong 由 axum 处理)
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    bus.unregister_connection(&connection_id);
}

async fn send_frame<S>(sink: &mut S, frame: &ServerFrame) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(frame).map_err(|_| ())?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
