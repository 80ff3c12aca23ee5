//! 订单查询服务
//!
//! 消费 Kafka 订单消息，事务性写入 PostgreSQL 并维护内存缓存，
//! 对外提供按 order_uid 的 HTTP 查询。

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use order_lookup_service::{
    cache::OrderCache,
    consumer::OrderConsumer,
    repository::{OrderStore, PgOrderRepository},
    routes,
    state::AppState,
};
use order_shared::{config::AppConfig, database::Database, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("order-lookup-service").unwrap_or_default();

    logging::init(&config.observability)?;

    info!(
        environment = %config.environment,
        "Starting order-lookup-service on {}",
        config.server_addr()
    );

    // 初始化基础设施。没有持久存储就无法提供一致的数据，连接失败直接退出
    let db = Database::connect(&config.database)
        .await
        .context("数据库连接失败")?;

    let repository = Arc::new(PgOrderRepository::new(db.pool().clone()));
    let cache = OrderCache::new();

    // 启动阶段一次性全量加载：加载完成前不开始对外服务，
    // 避免对仅存在于持久存储中的订单误报 404
    for order in repository.load_all().await.context("订单全量加载失败")? {
        cache.insert(order);
    }
    info!(cached = cache.len(), "缓存预热完成");

    // 消费循环与 HTTP 服务共享同一个关闭信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer = OrderConsumer::new(&config, repository, cache.clone())?;
    let consumer_task = tokio::spawn(consumer.run(shutdown_rx));

    let state = AppState { cache, db: db.clone() };
    let app = routes::router(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 优雅关闭：收到 SIGTERM（K8s 停止 Pod）或 Ctrl+C 时，
    // 停止接收新连接并等待已有请求处理完毕
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // HTTP 已停止，通知消费循环退出并等待正在处理的消息完成
    let _ = shutdown_tx.send(true);
    consumer_task.await.context("消费任务异常退出")??;

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
/// 收到任一信号后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("注册 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
