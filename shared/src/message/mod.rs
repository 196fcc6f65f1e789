//! 实时消息类型定义
//!
//! 服务端和客户端共享：消息总线在进程内广播 [`BusMessage`]，
//! WebSocket 连接上发送 [`ServerFrame`]。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::staff::StaffRole;

pub mod event;
pub use event::RealtimeEvent;

/// 协议版本号
pub const PROTOCOL_VERSION: u16 = 1;

/// 订阅频道
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ChannelKey {
    /// Customer devices at one table
    Table(String),
    /// Staff devices of one role
    Staff(StaffRole),
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKey::Table(id) => write!(f, "table:{}", id),
            ChannelKey::Staff(role) => write!(f, "staff:{}", role),
        }
    }
}

/// 总线消息 (envelope)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BusMessage {
    /// Global write sequence of the commit that produced the event
    pub sequence: u64,
    pub table_id: String,
    pub session_id: String,
    #[serde(flatten)]
    pub event: RealtimeEvent,
}

impl BusMessage {
    pub fn new(
        sequence: u64,
        table_id: impl Into<String>,
        session_id: impl Into<String>,
        event: RealtimeEvent,
    ) -> Self {
        Self {
            sequence,
            table_id: table_id.into(),
            session_id: session_id.into(),
            event,
        }
    }

    /// Does a subscriber on `channel` receive this message?
    pub fn reaches(&self, channel: &ChannelKey) -> bool {
        match channel {
            ChannelKey::Table(table_id) => *table_id == self.table_id,
            ChannelKey::Staff(StaffRole::Admin) => true,
            ChannelKey::Staff(role) => self.event.staff_audience().contains(role),
        }
    }
}

/// Frame pushed over a realtime connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// First frame on every connection
    Hello {
        protocol_version: u16,
        /// Server instance epoch; changes on restart
        epoch: String,
        /// Last committed sequence at connect time
        sequence: u64,
    },
    Event(BusMessage),
    /// Subscriber fell behind; cached state must be re-fetched
    Resync { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderStatus;

    fn accepted(table: &str) -> BusMessage {
        BusMessage::new(
            7,
            table,
            "s1",
            RealtimeEvent::OrderStatusChanged {
                order_id: "o1".into(),
                status: OrderStatus::Accepted,
            },
        )
    }

    #[test]
    fn test_envelope_flattens_event() {
        let value = serde_json::to_value(accepted("t1")).unwrap();
        assert_eq!(value["sequence"], 7);
        assert_eq!(value["tableId"], "t1");
        assert_eq!(value["event"], "order.status_changed");
        assert_eq!(value["data"]["status"], "accepted");

        let back: BusMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, accepted("t1"));
    }

    #[test]
    fn test_reaches() {
        let msg = accepted("t1");
        assert!(msg.reaches(&ChannelKey::Table("t1".into())));
        assert!(!msg.reaches(&ChannelKey::Table("t2".into())));
        assert!(msg.reaches(&ChannelKey::Staff(StaffRole::Kitchen)));
        assert!(msg.reaches(&ChannelKey::Staff(StaffRole::Admin)));
    }

    #[test]
    fn test_frames() {
        let hello = ServerFrame::Hello {
            protocol_version: PROTOCOL_VERSION,
            epoch: "e".into(),
            sequence: 3,
        };
        let value = serde_json::to_value(&hello).unwrap();
        assert_eq!(value["type"], "hello");
        assert_eq!(value["protocolVersion"], 1);

        let frame = ServerFrame::Event(accepted("t1"));
        let text = serde_json::to_string(&frame).unwrap();
        let back: ServerFrame = serde_json::from_str(&text).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_channel_display() {
        assert_eq!(ChannelKey::Table("12".into()).to_string(), "table:12");
        assert_eq!(ChannelKey::Staff(StaffRole::Kitchen).to_string(), "staff:kitchen");
    }
}
