//! HTTP 请求/响应体

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hypeup_core::{HypeError, Result};
use serde::{Deserialize, Serialize};

use crate::domain::model::{
    ChatDraft, LifecycleState, MediaUpload, PostDraft, PostedMessage,
    RatingCounts, Role,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendChatMessageRequest {
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub receiver_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub message_content: Option<String>,
    #[serde(default)]
    pub expected_cost: Option<u64>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_type: Option<Role>,
}

impl From<SendChatMessageRequest> for ChatDraft {
    fn from(request: SendChatMessageRequest) -> Self {
        ChatDraft {
            sender_id: request.sender_id,
            receiver_id: request.receiver_id,
            body: request.message,
            kind: request.message_type,
            sender_display_name: request.sender_name,
            sender_role: request.sender_type,
            cost_content: request.message_content,
            cost_amount: request.expected_cost,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendChatMessageResponse {
    pub message: &'static str,
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConversationRequest {
    #[serde(default)]
    pub current_user_id: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConversationRequest {
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub receiver_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteConversationResponse {
    pub message: &'static str,
    pub deleted: usize,
}

/// base64 编码的图片
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPayload {
    pub file_name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub data: String,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

impl MediaPayload {
    pub fn decode(self) -> Result<MediaUpload> {
        let bytes = STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| HypeError::invalid_argument(format!("media is not valid base64: {}", e)))?;
        Ok(MediaUpload {
            original_name: self.file_name,
            content_type: self.content_type,
            bytes,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub cost: u64,
    #[serde(default)]
    pub receiver_id: String,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub media: Option<MediaPayload>,
}

impl CreatePostRequest {
    pub fn into_draft(self) -> Result<PostDraft> {
        let media = self.media.map(MediaPayload::decode).transpose()?;
        Ok(PostDraft {
            content: self.content,
            cost: self.cost,
            receiver_id: self.receiver_id,
            role: self.user_type,
            release_date: self.release_date,
            images: self.images,
            media,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostResponse {
    pub message: &'static str,
    pub new_message: PostedMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatePostRequest {
    #[serde(default)]
    pub user_id: String,
    pub rating: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatePostResponse {
    pub success: bool,
    pub message: &'static str,
    pub updated_message: PostedMessage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingCountsResponse {
    pub rating_counts: RatingCounts,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequesterParams {
    #[serde(default)]
    pub requester_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeletePostResponse {
    pub message: &'static str,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleStateResponse {
    pub post_id: String,
    pub state: LifecycleState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeStreamParams {
    #[serde(default)]
    pub owner_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: hypeup_core::ErrorCode,
    pub error: String,
}
