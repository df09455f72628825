//! 主应用程序入口
//!
//! 启动市场聊天子系统的 Axum Web 服务。

use std::sync::Arc;

use application::services::{ChatService, ChatServiceDependencies};
use application::SystemClock;
use config::AppConfig;
use infrastructure::{
    create_pg_pool, LocalMessageBroadcaster, PgChatStore, PgIdentityGateway, PgListingGateway,
    MIGRATOR,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 读取环境变量配置
    let config = AppConfig::from_env_with_defaults();
    config.validate()?;

    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').next_back().unwrap_or("unknown")
    );

    let pg_pool = create_pg_pool(
        &config.database.url,
        config.database.max_connections,
        config.database.acquire_timeout(),
    )
    .await?;

    // 运行迁移
    MIGRATOR.run(&pg_pool).await?;

    // 组装存储、网关与广播器
    let chat_store = Arc::new(PgChatStore::new(pg_pool.clone()));
    let identity_gateway = Arc::new(PgIdentityGateway::new(pg_pool.clone()));
    let listing_gateway = Arc::new(PgListingGateway::new(pg_pool));
    let clock = Arc::new(SystemClock);
    let broadcaster = Arc::new(LocalMessageBroadcaster::new(config.broadcast.capacity));

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        chat_store,
        identity_gateway,
        listing_gateway,
        clock,
        broadcaster: broadcaster.clone(),
    }));

    let state = AppState::new(chat_service, broadcaster);

    // 启动 Web 服务器
    let app = router(state);
    let bind_address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    tracing::info!("市场聊天服务启动在 http://{}", bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}
