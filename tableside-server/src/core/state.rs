use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::auth::jwt::generate_secure_printable_jwt_secret;
use crate::auth::{JwtConfig, JwtService, TableTokenService};
use crate::catalog::MemoryCatalog;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result, ServerError};
use crate::message::MessageBus;
use crate::orders::{Actor, AutoCook, CommandPayload, DiningCommand, DiningManager, DiningStorage};
use crate::payments::{MockGateway, PaymentGateways, SignedRedirectGateway};

/// 服务器状态 - 持有所有服务的共享引用
///
/// 使用 Arc 实现浅拷贝，每个请求克隆一次。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | manager | Arc<DiningManager> | 会话 / 订单 / 账单状态机，持有 redb 与消息总线 |
/// | jwt_service | Arc<JwtService> | 员工 JWT 认证 |
/// | catalog | Arc<MemoryCatalog> | 菜单 (定价只读) |
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub manager: Arc<DiningManager>,
    pub jwt_service: Arc<JwtService>,
    pub catalog: Arc<MemoryCatalog>,
}

/// 幂等记录清理周期
const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// `tables.json` entry
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableSeed {
    table_id: String,
    table_number: String,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 1. 打开 `WORK_DIR/database/tableside.redb`
    /// 2. 加载 `catalog.json`
    /// 3. 注册 `tables.json` 中的桌台
    pub fn initialize(config: &Config) -> Result<Self> {
        let db_path = config.database_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let storage = DiningStorage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Database opened");

        let catalog = MemoryCatalog::load_json(config.catalog_seed_path())?;
        let state = Self::build(config.clone(), storage, catalog)?;
        state.seed_tables(&config.tables_seed_path())?;
        Ok(state)
    }

    /// Wire services around an already opened storage
    pub fn build(config: Config, storage: DiningStorage, catalog: MemoryCatalog) -> Result<Self> {
        let production = config.is_production();

        let table_secret = match &config.table_token_secret {
            Some(secret) => secret.clone(),
            None if production => {
                return Err(ServerError::Config(
                    "TABLE_TOKEN_SECRET must be set in production".to_string(),
                ));
            }
            None => {
                tracing::warn!(
                    "⚠️  TABLE_TOKEN_SECRET not set! Printed QR codes stop working after restart."
                );
                generate_secure_printable_jwt_secret()?
            }
        };

        let jwt_config = JwtConfig::resolve(
            config.jwt_secret.clone(),
            config.jwt_expiration_minutes,
            config.jwt_issuer.clone(),
            config.jwt_audience.clone(),
            production,
        )?;

        let gateways = PaymentGateways::new(
            config.payment_provider,
            MockGateway::new(config.public_base_url.clone()),
            config.gateway.clone().map(SignedRedirectGateway::new),
        );
        if gateways.get(config.payment_provider).is_err() {
            tracing::warn!(
                provider = ?config.payment_provider,
                "Default payment provider is not configured; online payments will fail"
            );
        }

        let catalog = Arc::new(catalog);
        let manager = DiningManager::new(
            storage,
            MessageBus::with_capacity(config.event_channel_capacity),
            catalog.clone(),
            Arc::new(TableTokenService::new(table_secret.as_bytes())),
            Arc::new(gateways),
        );

        Ok(Self {
            config,
            manager: Arc::new(manager),
            jwt_service: Arc::new(JwtService::with_config(jwt_config)),
            catalog,
        })
    }

    /// Register (upsert) the tables listed in `path`; epochs are kept
    pub fn seed_tables(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Table seed file not found");
            return Ok(());
        }
        let raw = std::fs::read_to_string(path)?;
        let seeds: Vec<TableSeed> = serde_json::from_str(&raw)
            .map_err(|e| ServerError::Seed(format!("{}: {e}", path.display())))?;

        for seed in &seeds {
            self.manager.execute(DiningCommand::new(
                Actor::System,
                CommandPayload::RegisterTable {
                    table_id: seed.table_id.clone(),
                    table_number: seed.table_number.clone(),
                },
            ))?;
        }
        tracing::info!(tables = seeds.len(), "Tables registered");
        Ok(())
    }

    /// 启动后台任务
    ///
    /// 任务共享消息总线的关闭令牌，服务器退出时一并停止。
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::with_token(self.manager.bus().shutdown_token().clone());

        if self.config.auto_cook {
            let cook = AutoCook::new(
                self.manager.clone(),
                Duration::from_secs(self.config.auto_cook_prep_secs),
            );
            let rx = self.manager.bus().subscribe();
            let token = tasks.shutdown_token();
            tasks.spawn("auto_cook", TaskKind::Listener, cook.run(rx, token));
        }

        let retention = Duration::from_secs(self.config.command_retention_hours * 3600);
        let token = tasks.shutdown_token();
        tasks.spawn(
            "command_pruner",
            TaskKind::Worker,
            prune_command_records(self.manager.clone(), retention, token),
        );

        tasks.log_summary();
        tasks
    }

    pub fn bus(&self) -> &MessageBus {
        self.manager.bus()
    }
}

/// 定期清理过期的幂等记录
async fn prune_command_records(
    manager: Arc<DiningManager>,
    retention: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let cutoff = shared::util::now_millis() - retention.as_millis() as i64;
                if let Err(e) = manager.prune_command_records(cutoff) {
                    tracing::warn!(error = %e, "Idempotency record pruning failed");
                }
            }
        }
    }
}
