use std::path::PathBuf;

use shared::bill::PaymentProvider;

use crate::payments::SignedRedirectConfig;

/// 服务器配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖 (`.env` 由 dotenv 加载)：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (数据库、种子文件) |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 (RUST_LOG 优先) |
/// | LOG_DIR | - | 日志目录，设置后按天滚动写文件 |
/// | LOG_JSON | false | JSON 格式日志 |
/// | PUBLIC_BASE_URL | http://localhost:3000 | 对外地址 (二维码、mock 支付页) |
/// | TABLE_TOKEN_SECRET | - | 桌台令牌密钥 (生产环境必填) |
/// | AUTO_COOK | false | 启用自动出餐模拟 |
/// | AUTO_COOK_PREP_SECS | 5 | 每道菜模拟制作时间(秒) |
/// | EVENT_CHANNEL_CAPACITY | 1024 | 实时广播通道容量 |
/// | COMMAND_RETENTION_HOURS | 24 | 幂等记录保留时长(小时) |
/// | PAYMENT_PROVIDER | mock | 默认支付渠道: mock / signed_redirect |
/// | GATEWAY_PAY_URL | - | 签名跳转网关支付地址 |
/// | GATEWAY_MERCHANT_CODE | - | 商户号 |
/// | GATEWAY_HASH_SECRET | - | 签名密钥 |
/// | GATEWAY_RETURN_URL | {PUBLIC_BASE_URL}/payment/return | 支付完成跳转地址 |
/// | JWT_SECRET | - | 员工 JWT 密钥 (>= 32 字符) |
/// | JWT_EXPIRATION_MINUTES | 720 | JWT 有效期(分钟) |
/// | JWT_ISSUER | tableside-server | JWT 签发者 |
/// | JWT_AUDIENCE | tableside-staff | JWT 受众 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/tableside HTTP_PORT=8080 AUTO_COOK=true cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库和种子文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub log_json: bool,
    /// 对外访问地址
    pub public_base_url: String,
    pub table_token_secret: Option<String>,
    pub auto_cook: bool,
    pub auto_cook_prep_secs: u64,
    pub event_channel_capacity: usize,
    /// 幂等记录保留时长，过期后由后台任务清理
    pub command_retention_hours: u64,
    pub payment_provider: PaymentProvider,
    /// 签名跳转网关 (未配置时只能使用 mock)
    pub gateway: Option<SignedRedirectConfig>,
    pub jwt_secret: Option<String>,
    pub jwt_expiration_minutes: i64,
    pub jwt_issuer: String,
    pub jwt_audience: String,
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        let public_base_url = env_opt("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();

        let gateway = match (
            env_opt("GATEWAY_PAY_URL"),
            env_opt("GATEWAY_MERCHANT_CODE"),
            env_opt("GATEWAY_HASH_SECRET"),
        ) {
            (Some(pay_url), Some(merchant_code), Some(hash_secret)) => {
                Some(SignedRedirectConfig {
                    pay_url,
                    merchant_code,
                    hash_secret,
                    return_url: env_opt("GATEWAY_RETURN_URL")
                        .unwrap_or_else(|| format!("{public_base_url}/payment/return")),
                })
            }
            _ => None,
        };

        let payment_provider = match env_opt("PAYMENT_PROVIDER") {
            Some(raw) => raw.trim().parse::<PaymentProvider>().unwrap_or_else(|e: String| {
                tracing::warn!(error = %e, "Unknown PAYMENT_PROVIDER, falling back to mock");
                PaymentProvider::Mock
            }),
            None => PaymentProvider::Mock,
        };

        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: env_opt("LOG_DIR"),
            log_json: env_parse("LOG_JSON", false),
            public_base_url,
            table_token_secret: env_opt("TABLE_TOKEN_SECRET"),
            auto_cook: env_parse("AUTO_COOK", false),
            auto_cook_prep_secs: env_parse("AUTO_COOK_PREP_SECS", 5),
            event_channel_capacity: env_parse(
                "EVENT_CHANNEL_CAPACITY",
                crate::message::DEFAULT_CHANNEL_CAPACITY,
            ),
            command_retention_hours: env_parse("COMMAND_RETENTION_HOURS", 24),
            payment_provider,
            gateway,
            jwt_secret: env_opt("JWT_SECRET"),
            jwt_expiration_minutes: env_parse("JWT_EXPIRATION_MINUTES", 720),
            jwt_issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "tableside-server".into()),
            jwt_audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "tableside-staff".into()),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
            .join("database")
            .join("tableside.redb")
    }

    pub fn tables_seed_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("tables.json")
    }

    pub fn catalog_seed_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("catalog.json")
    }

    /// Customer entry URL encoded into a table's QR code
    pub fn table_url(&self, table_id: &str, token: &str) -> String {
        format!("{}/t/{table_id}?token={token}", self.public_base_url)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
