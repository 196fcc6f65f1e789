//! Tableside Server - 扫码点餐服务端
//!
//! # 架构概述
//!
//! - **会话** (`orders`): 每桌最多一个未关闭会话，状态只前进
//! - **订单**: 草稿 → 提交 → 接单 → 逐行出餐 → 上菜
//! - **账单**: 已上菜行实时合计，现金或在线支付后冻结
//! - **实时推送** (`message`): 提交后广播，WebSocket 按频道过滤
//! - **存储**: 嵌入式 redb，所有写入串行化
//!
//! # 模块结构
//!
//! ```text
//! tableside-server/src/
//! ├── core/          # 配置、状态、错误、后台任务
//! ├── auth/          # 员工 JWT、桌台令牌、权限
//! ├── api/           # HTTP 路由和处理器
//! ├── catalog/       # 菜单与定价
//! ├── message/       # 消息总线 + WebSocket
//! ├── orders/        # 会话 / 订单 / 账单状态机
//! ├── payments/      # 支付网关适配
//! └── utils/         # 日志、校验
//! ```

pub mod api;
pub mod auth;
pub mod catalog;
pub mod core;
pub mod message;
pub mod orders;
pub mod payments;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use orders::{DiningManager, DiningStorage};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

pub use utils::logger::{init_logger, init_logger_with_file};

// Security logging macro - 支持 tracing 格式说明符
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// 设置运行环境: 加载 `.env`、初始化日志
pub fn setup_environment() -> Config {
    dotenv::dotenv().ok();
    let config = Config::from_env();
    init_logger_with_file(
        Some(&config.log_level),
        config.log_json,
        config.log_dir.as_deref(),
    );
    config
}

pub fn print_banner() {
    println!(
        r#"
 _____     _     _           _     _
|_   _|_ _| |__ | | ___  ___(_) __| | ___
  | |/ _` | '_ \| |/ _ \/ __| |/ _` |/ _ \
  | | (_| | |_) | |  __/\__ \ | (_| |  __/
  |_|\__,_|_.__/|_|\___||___/_|\__,_|\___|
    "#
    );
}
