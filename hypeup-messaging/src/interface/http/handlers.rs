use std::convert::Infallible;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::{Stream, StreamExt};
use hypeup_core::metrics::gather_text;
use serde::de::DeserializeOwned;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use super::AppState;
use super::dto::{
    CreatePostRequest, CreatePostResponse, DeleteConversationRequest,
    DeleteConversationResponse, DeletePostResponse, LifecycleStateResponse,
    ListConversationRequest, NoticeStreamParams, RatePostRequest, RatePostResponse,
    RatingCountsResponse, RequesterParams, SendChatMessageRequest, SendChatMessageResponse,
};
use super::error::{ApiError, ApiResult};
use crate::application::commands::{
    ConfirmNoticeCommand, CreatePostCommand, DeleteConversationMessagesCommand, DeletePostCommand,
    RatePostCommand, SendChatMessageCommand,
};
use crate::application::queries::{ListConversationQuery, RatingCountsQuery};
use crate::domain::model::{ChatMessage, PostProjection};

/// JSON 请求体提取器，解析失败统一返回 400
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// 查询参数提取器
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

pub async fn list_posts(State(state): State<AppState>) -> ApiResult<Json<Vec<PostProjection>>> {
    let posts = state.queries.handle_list_posts().await?;
    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<CreatePostResponse>)> {
    let draft = request.into_draft()?;
    let post = state
        .commands
        .handle_create_post(CreatePostCommand { draft })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse {
            message: "Message posted successfully",
            new_message: post,
        }),
    ))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    ApiQuery(params): ApiQuery<RequesterParams>,
) -> ApiResult<Json<DeletePostResponse>> {
    let deleted = state
        .commands
        .handle_delete_post(DeletePostCommand {
            post_id,
            requester_id: params.requester_id,
        })
        .await?;
    let message = if deleted {
        "Message deleted successfully"
    } else {
        "Message already deleted"
    };
    Ok(Json(DeletePostResponse { message, deleted }))
}

pub async fn confirm_notice(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    ApiJson(params): ApiJson<RequesterParams>,
) -> ApiResult<Json<DeletePostResponse>> {
    let deleted = state
        .commands
        .handle_confirm_notice(ConfirmNoticeCommand {
            post_id,
            requester_id: params.requester_id,
        })
        .await?;
    let message = if deleted {
        "Message deleted successfully"
    } else {
        "Message already deleted"
    };
    Ok(Json(DeletePostResponse { message, deleted }))
}

pub async fn rate_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    ApiJson(request): ApiJson<RatePostRequest>,
) -> ApiResult<(StatusCode, Json<RatePostResponse>)> {
    let post = state
        .commands
        .handle_rate_post(RatePostCommand {
            post_id,
            rater_id: request.user_id,
            star: request.rating,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RatePostResponse {
            success: true,
            message: "Rating stored successfully",
            updated_message: post,
        }),
    ))
}

pub async fn rating_counts(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<Json<RatingCountsResponse>> {
    let rating_counts = state
        .queries
        .handle_rating_counts(RatingCountsQuery { post_id })
        .await?;
    Ok(Json(RatingCountsResponse { rating_counts }))
}

pub async fn lifecycle_state(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Json<LifecycleStateResponse> {
    let lifecycle = state.queries.lifecycle_state(&post_id);
    Json(LifecycleStateResponse {
        post_id,
        state: lifecycle,
    })
}

/// 删除提醒与删除事件的 SSE 推送，可按发帖人过滤
pub async fn lifecycle_events(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<NoticeStreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let owner_filter = params.owner_id.filter(|id| !id.is_empty());
    let stream = BroadcastStream::new(state.queries.subscribe_lifecycle()).filter_map(move |item| {
        let owner_filter = owner_filter.clone();
        async move {
            let event = match item {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Lifecycle event subscriber lagged");
                    return None;
                }
            };
            if let Some(owner) = &owner_filter {
                if event.owner_id() != owner {
                    return None;
                }
            }
            match Event::default().event(event.name()).json_data(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(e) => {
                    warn!(error = %e, "Failed to encode lifecycle event");
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn send_chat_message(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SendChatMessageRequest>,
) -> ApiResult<(StatusCode, Json<SendChatMessageResponse>)> {
    let id = state
        .commands
        .handle_send_chat_message(SendChatMessageCommand {
            draft: request.into(),
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SendChatMessageResponse {
            message: "Message sent successfully",
            id,
        }),
    ))
}

pub async fn list_conversation(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ListConversationRequest>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let messages = state
        .queries
        .handle_list_conversation(ListConversationQuery {
            current_user_id: request.current_user_id,
            other_user_id: request.user_id,
        })
        .await?;
    Ok(Json(messages))
}

pub async fn delete_conversation_messages(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DeleteConversationRequest>,
) -> ApiResult<Json<DeleteConversationResponse>> {
    let deleted = state
        .commands
        .handle_delete_conversation_messages(DeleteConversationMessagesCommand {
            sender_id: request.sender_id,
            receiver_id: request.receiver_id,
        })
        .await?;
    Ok(Json(DeleteConversationResponse {
        message: "Messages deleted successfully",
        deleted,
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_text(&state.registry),
    )
}
