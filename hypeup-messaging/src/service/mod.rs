use anyhow::{Context, Result};
use hypeup_core::config::HypeAppConfig;
use hypeup_core::metrics::REGISTRY;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::MessagingConfig;

pub mod wire;

pub use wire::ApplicationContext;

/// 应用启动器
pub struct ApplicationBootstrap;

impl ApplicationBootstrap {
    /// 运行应用的主入口点
    pub async fn run(app_config: &HypeAppConfig) -> Result<()> {
        app_config.validate_references()?;
        let config = MessagingConfig::from_app_config(app_config)
            .context("Failed to load messaging service configuration")?;

        info!(
            service_name = %config.service_name,
            address = %config.listen_addr,
            "Initializing messaging service..."
        );

        // 使用 Wire 风格的依赖注入构建应用上下文
        let context = wire::initialize(&config, REGISTRY.clone()).await?;
        info!(
            rescheduled = context.recovery.rescheduled,
            expired = context.recovery.expired,
            failed = context.recovery.failed,
            "ApplicationBootstrap created successfully"
        );

        Self::run_with_context(context, &config).await
    }

    /// 运行 HTTP 服务，Ctrl+C 时优雅退出
    async fn run_with_context(context: ApplicationContext, config: &MessagingConfig) -> Result<()> {
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

        info!(
            address = %config.listen_addr,
            port = %config.listen_addr.port(),
            "✅ Messaging HTTP service is listening"
        );

        let served = axum::serve(listener, context.router)
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("shutdown signal received (Ctrl+C)");
                }
            })
            .await;

        // 定时器只取消不删除，下次启动时恢复
        context.scheduler.shutdown();
        info!("Messaging service stopped");

        served.context("HTTP server error")
    }
}
