//! HTTP 接口层
//!
//! 路由沿用客户端既有的路径：`/messages` 为帖子，`/chat` 为私聊

pub mod dto;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use prometheus::Registry;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::application::{MessagingCommandHandler, MessagingQueryHandler};

pub use error::{ApiError, ApiResult};

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub commands: Arc<MessagingCommandHandler>,
    pub queries: Arc<MessagingQueryHandler>,
    pub registry: Registry,
}

/// 构建 HTTP 路由
///
/// 未配置允许的来源时使用宽松 CORS
pub fn build_router(state: AppState, cors_allowed_origin: Option<&str>) -> Result<Router> {
    let cors = match cors_allowed_origin {
        Some(origin) => {
            let origin = HeaderValue::from_str(origin)
                .with_context(|| format!("invalid CORS origin '{}'", origin))?;
            CorsLayer::permissive().allow_origin(origin)
        }
        None => CorsLayer::permissive(),
    };

    let router = Router::new()
        .route(
            "/messages",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route("/messages/notices", get(handlers::lifecycle_events))
        .route("/messages/{id}", axum::routing::delete(handlers::delete_post))
        .route(
            "/messages/{id}/ratings",
            get(handlers::rating_counts).post(handlers::rate_post),
        )
        .route("/messages/{id}/notice/confirm", post(handlers::confirm_notice))
        .route("/messages/{id}/lifecycle", get(handlers::lifecycle_state))
        .route("/chat/send-message", post(handlers::send_chat_message))
        .route("/chat/messages", post(handlers::list_conversation))
        .route(
            "/chat/delete-messages",
            post(handlers::delete_conversation_messages),
        )
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(router)
}
