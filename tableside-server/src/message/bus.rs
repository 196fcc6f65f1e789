//! 消息总线核心实现
//!
//! # 消息流
//!
//! ```text
//! DiningManager ──commit──▶ publish() ──▶ broadcast::Sender<BusMessage>
//!                                              │
//!                     ┌────────────────────────┼─────────────────────┐
//!                     ▼                        ▼                     ▼
//!              ws (table:{id})          ws (staff:{role})      auto-cook listener
//! ```
//!
//! Delivery is best-effort and in-process only; a subscriber that falls more
//! than `capacity` messages behind gets `Lagged` and must resync.

use std::sync::Arc;

use dashmap::DashMap;
use shared::message::{BusMessage, ChannelKey};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Default capacity of the broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Registered realtime connection
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub channel: ChannelKey,
    pub connected_at: i64,
}

/// 消息总线
#[derive(Debug, Clone)]
pub struct MessageBus {
    /// 服务器到订阅者的广播通道
    server_tx: broadcast::Sender<BusMessage>,
    /// 关闭信号令牌
    shutdown_token: CancellationToken,
    /// 已连接的实时客户端 (connection id -> info)
    connections: Arc<DashMap<String, ConnectionInfo>>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建指定容量的消息总线
    pub fn with_capacity(capacity: usize) -> Self {
        let (server_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            server_tx,
            shutdown_token: CancellationToken::new(),
            connections: Arc::new(DashMap::new()),
        }
    }

    /// 发布消息 (fire-and-forget)
    ///
    /// No subscribers is not an error: nobody is looking at that table.
    pub fn publish(&self, msg: BusMessage) {
        let name = msg.event.name();
        let sequence = msg.sequence;
        if self.server_tx.send(msg).is_err() {
            tracing::trace!(event = name, sequence, "No realtime subscribers");
        }
    }

    /// 订阅服务器广播
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.server_tx.subscribe()
    }

    /// 获取关闭令牌
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    pub fn register_connection(&self, connection_id: &str, channel: ChannelKey) {
        tracing::info!(connection_id, channel = %channel, "Realtime client connected");
        self.connections.insert(
            connection_id.to_string(),
            ConnectionInfo {
                channel,
                connected_at: shared::util::now_millis(),
            },
        );
    }

    pub fn unregister_connection(&self, connection_id: &str) {
        if let Some((_, info)) = self.connections.remove(connection_id) {
            tracing::info!(connection_id, channel = %info.channel, "Realtime client disconnected");
        }
    }

    /// 已连接客户端数量
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn connections_on(&self, channel: &ChannelKey) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().channel == *channel)
            .count()
    }
}
