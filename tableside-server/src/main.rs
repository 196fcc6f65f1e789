use tableside_server::{Server, ServerState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 日志) 并加载配置
    let config = setup_environment();

    print_banner();
    tracing::info!(environment = %config.environment, "🍜 Tableside server starting...");

    // 2. 初始化服务器状态 (数据库、菜单、桌台)
    let state = ServerState::initialize(&config)?;

    // 3. 启动 HTTP 服务器 (后台任务随之启动)
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
