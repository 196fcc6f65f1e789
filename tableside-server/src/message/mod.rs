//! 实时消息模块
//!
//! - [`MessageBus`]: 进程内广播，DiningManager 提交后发布
//! - [`ws`]: `/api/ws` WebSocket 端点，按频道过滤推送

mod bus;
pub mod ws;

pub use bus::{ConnectionInfo, DEFAULT_CHANNEL_CAPACITY, MessageBus};
