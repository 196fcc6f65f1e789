//! Client configuration

use std::time::Duration;

/// Who the client speaks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Customer device holding a scanned QR code
    Table { table_id: String, token: String },
    /// Kitchen / waiter / admin device with a JWT
    Staff { token: String },
}

impl Credentials {
    pub fn table(table_id: impl Into<String>, token: impl Into<String>) -> Self {
        Credentials::Table {
            table_id: table_id.into(),
            token: token.into(),
        }
    }

    pub fn staff(token: impl Into<String>) -> Self {
        Credentials::Staff {
            token: token.into(),
        }
    }
}

/// 实时连接配置 (重连退避)
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// 是否启用自动重连
    pub auto_reconnect: bool,
    /// 首次重连延迟
    pub reconnect_delay: Duration,
    /// 最大重连延迟 (指数退避上限)
    pub max_reconnect_delay: Duration,
    /// 最大重连尝试次数 (0 表示无限重试)
    pub max_reconnect_attempts: u32,
    /// 随机抖动比例 (0.0 - 1.0)
    pub jitter: f64,
    /// 心跳间隔 (0 表示禁用)
    pub ping_interval: Duration,
}

impl Default for RealtimeConfig {
    /// 局域网优化配置
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(10),
            max_reconnect_attempts: 0,
            jitter: 0.2,
            ping_interval: Duration::from_secs(20),
        }
    }
}

impl RealtimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 广域网/移动网络配置
    ///
    /// 容忍高延迟，退避上限 60 秒
    pub fn wan() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(60),
            max_reconnect_attempts: 0,
            jitter: 0.3,
            ping_interval: Duration::from_secs(30),
        }
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_reconnect_delay(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_delay = initial;
        self.max_reconnect_delay = max.max(initial);
        self
    }

    /// 设置最大重连尝试次数 (0 表示无限重试)
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before reconnect attempt `attempt` (0-based), before jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.reconnect_delay
            .saturating_mul(factor)
            .min(self.max_reconnect_delay)
    }
}

/// Client configuration for connecting to a Tableside server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g., "http://localhost:3000")
    pub base_url: String,

    pub credentials: Option<Credentials>,

    /// Request timeout
    pub timeout: Duration,

    /// 支付回跳后轮询账单的间隔
    pub poll_interval: Duration,

    /// 轮询超时，超时后返回 ConfirmationPending
    pub poll_timeout: Duration,

    pub realtime: RealtimeConfig,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(1200),
            poll_timeout: Duration::from_secs(25),
            realtime: RealtimeConfig::default(),
        }
    }

    /// Customer client for one table
    pub fn for_table(
        base_url: impl Into<String>,
        table_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self::new(base_url).with_credentials(Credentials::table(table_id, token))
    }

    /// Staff client
    pub fn for_staff(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(base_url).with_credentials(Credentials::staff(token))
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    pub fn with_realtime(mut self, realtime: RealtimeConfig) -> Self {
        self.realtime = realtime;
        self
    }

    /// Create an HTTP client from this configuration
    pub fn build_http_client(&self) -> crate::ClientResult<crate::HttpClient> {
        crate::HttpClient::new(self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}
