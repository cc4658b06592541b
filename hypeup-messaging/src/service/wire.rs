//! Wire 风格的依赖注入模块
//!
//! 按依赖顺序构建存储、领域服务、应用处理器与 HTTP 路由

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use prometheus::Registry;
use tracing::{info, warn};

use crate::application::{MessagingCommandHandler, MessagingQueryHandler};
use crate::config::{IdentityBackend, MessageStoreBackend, MessagingConfig};
use crate::domain::model::{ChatMessage, PostedMessage};
use crate::domain::repository::{BlobStore, ChatStoreRef, IdentityResolver, PostStoreRef};
use crate::domain::service::{
    ChatDeliveryService, KeyedLocks, LifecycleScheduler, PostDomainService, ProjectionService,
    RatingAggregator, RecoveryReport,
};
use crate::infrastructure::blob::FilesystemBlobStore;
use crate::infrastructure::identity::{InMemoryIdentityDirectory, MongoIdentityResolver};
use crate::infrastructure::persistence::redis_store;
use crate::infrastructure::persistence::{InMemoryMessageStore, RedisMessageStore};
use crate::interface::http::{AppState, build_router};
use hypeup_core::metrics::MessagingMetrics;

/// 基础设施组件
pub struct Backends {
    pub chats: ChatStoreRef,
    pub posts: PostStoreRef,
    pub identity: Arc<dyn IdentityResolver>,
    pub blobs: Option<Arc<dyn BlobStore>>,
}

/// 应用上下文 - 包含所有已初始化的服务
pub struct ApplicationContext {
    pub router: Router,
    pub scheduler: LifecycleScheduler,
    pub recovery: RecoveryReport,
}

/// 构建应用上下文
///
/// 类似 Go Wire 的 Initialize 函数
pub async fn initialize(config: &MessagingConfig, registry: Registry) -> Result<ApplicationContext> {
    let backends = build_backends(config).await?;
    assemble(config, backends, registry).await
}

/// 按配置创建存储、身份目录与图片存储
pub async fn build_backends(config: &MessagingConfig) -> Result<Backends> {
    let (chats, posts): (ChatStoreRef, PostStoreRef) = match &config.message_store {
        MessageStoreBackend::Memory => {
            warn!("Using in-memory message store, data will not survive restarts");
            (
                Arc::new(InMemoryMessageStore::<ChatMessage>::new()),
                Arc::new(InMemoryMessageStore::<PostedMessage>::new()),
            )
        }
        MessageStoreBackend::Redis { url, database } => {
            let conn = redis_store::connect(url, *database)
                .await
                .context("Failed to connect to Redis")?;
            info!(
                key_prefix = %config.key_prefix,
                database = ?database,
                "Using Redis message store"
            );
            (
                Arc::new(RedisMessageStore::<ChatMessage>::new(
                    conn.clone(),
                    &config.key_prefix,
                )),
                Arc::new(RedisMessageStore::<PostedMessage>::new(
                    conn,
                    &config.key_prefix,
                )),
            )
        }
    };

    let identity: Arc<dyn IdentityResolver> = match &config.identity_store {
        IdentityBackend::Memory => {
            warn!("Using empty in-memory identity directory");
            Arc::new(InMemoryIdentityDirectory::new())
        }
        IdentityBackend::Mongo { url, database } => Arc::new(
            MongoIdentityResolver::connect(url, database.as_deref())
                .await
                .context("Failed to connect to MongoDB")?,
        ),
    };

    let blobs: Option<Arc<dyn BlobStore>> = match &config.blob_store {
        Some(settings) => {
            let store = FilesystemBlobStore::new(&settings.root_dir, settings.base_url.clone())
                .context("Failed to prepare blob directory")?;
            info!(root_dir = %settings.root_dir, "Blob store initialized");
            Some(Arc::new(store))
        }
        None => {
            info!("Blob store not configured, media uploads disabled");
            None
        }
    };

    Ok(Backends {
        chats,
        posts,
        identity,
        blobs,
    })
}

/// 组装领域服务与路由，并恢复已有帖子的生命周期
pub async fn assemble(
    config: &MessagingConfig,
    backends: Backends,
    registry: Registry,
) -> Result<ApplicationContext> {
    let metrics = Arc::new(MessagingMetrics::new().context("Failed to create metrics")?);
    metrics
        .register(&registry)
        .context("Failed to register metrics")?;

    let locks = Arc::new(KeyedLocks::new());
    let scheduler = LifecycleScheduler::new(
        backends.posts.clone(),
        locks.clone(),
        config.lifecycle.clone(),
        metrics.clone(),
    );

    let chat = Arc::new(ChatDeliveryService::new(
        backends.chats,
        backends.identity.clone(),
        metrics.clone(),
    ));
    let posts = Arc::new(PostDomainService::new(
        backends.posts.clone(),
        backends.identity,
        backends.blobs,
        scheduler.clone(),
        metrics.clone(),
    ));
    let ratings = Arc::new(RatingAggregator::new(
        backends.posts.clone(),
        locks,
        metrics,
    ));
    let projection = Arc::new(ProjectionService::new(backends.posts));

    let commands = Arc::new(MessagingCommandHandler::new(
        chat.clone(),
        posts,
        ratings.clone(),
    ));
    let queries = Arc::new(MessagingQueryHandler::new(
        chat,
        projection,
        ratings,
        scheduler.clone(),
    ));

    let recovery = scheduler
        .recover()
        .await
        .context("Failed to recover post lifecycles")?;

    let router = build_router(
        AppState {
            commands,
            queries,
            registry,
        },
        config.cors_allowed_origin.as_deref(),
    )?;

    Ok(ApplicationContext {
        router,
        scheduler,
        recovery,
    })
}
