use std::sync::Arc;

use hypeup_core::{HypeError, Result};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::application::commands::{
    ConfirmNoticeCommand, CreatePostCommand, DeleteConversationMessagesCommand, DeletePostCommand,
    RatePostCommand, SendChatMessageCommand,
};
use crate::application::queries::{ListConversationQuery, RatingCountsQuery};
use crate::domain::model::{
    ChatMessage, LifecycleEvent, LifecycleState, PostProjection, PostedMessage, RatingCounts,
};
use crate::domain::service::{
    ChatDeliveryService, LifecycleScheduler, PostDomainService, ProjectionService,
    RatingAggregator,
};

/// 消息命令处理器
pub struct MessagingCommandHandler {
    chat: Arc<ChatDeliveryService>,
    posts: Arc<PostDomainService>,
    ratings: Arc<RatingAggregator>,
}

impl MessagingCommandHandler {
    pub fn new(
        chat: Arc<ChatDeliveryService>,
        posts: Arc<PostDomainService>,
        ratings: Arc<RatingAggregator>,
    ) -> Self {
        Self {
            chat,
            posts,
            ratings,
        }
    }

    /// 处理发送聊天消息命令
    pub async fn handle_send_chat_message(&self, command: SendChatMessageCommand) -> Result<String> {
        debug!(
            sender_id = %command.draft.sender_id,
            receiver_id = %command.draft.receiver_id,
            kind = ?command.draft.kind,
            "Handling send chat message command"
        );

        let id = self.chat.send(command.draft).await?;
        info!(message_id = %id, "Chat message sent");
        Ok(id)
    }

    /// 处理删除聊天消息命令
    pub async fn handle_delete_conversation_messages(
        &self,
        command: DeleteConversationMessagesCommand,
    ) -> Result<usize> {
        if command.sender_id.is_empty() || command.receiver_id.is_empty() {
            return Err(HypeError::invalid_argument(
                "Sender ID and Receiver ID are required",
            ));
        }
        debug!(
            sender_id = %command.sender_id,
            receiver_id = %command.receiver_id,
            "Handling delete conversation messages command"
        );

        let deleted = self
            .chat
            .delete_conversation_messages(&command.receiver_id)
            .await?;
        info!(receiver_id = %command.receiver_id, deleted, "Conversation messages deleted");
        Ok(deleted)
    }

    /// 处理发帖命令
    pub async fn handle_create_post(&self, command: CreatePostCommand) -> Result<PostedMessage> {
        debug!(
            receiver_id = %command.draft.receiver_id,
            role = ?command.draft.role,
            has_media = command.draft.media.is_some(),
            "Handling create post command"
        );
        self.posts.create_post(command.draft).await
    }

    /// 处理评分命令
    pub async fn handle_rate_post(&self, command: RatePostCommand) -> Result<PostedMessage> {
        debug!(
            post_id = %command.post_id,
            rater_id = %command.rater_id,
            star = command.star,
            "Handling rate post command"
        );

        let (post, _) = self
            .ratings
            .apply_rating(&command.post_id, &command.rater_id, command.star)
            .await?;
        Ok(post)
    }

    /// 处理发帖人删除命令
    pub async fn handle_delete_post(&self, command: DeletePostCommand) -> Result<bool> {
        debug!(
            post_id = %command.post_id,
            requester_id = %command.requester_id,
            "Handling delete post command"
        );
        self.posts
            .delete_post(&command.post_id, &command.requester_id)
            .await
    }

    /// 处理确认删除提醒命令
    pub async fn handle_confirm_notice(&self, command: ConfirmNoticeCommand) -> Result<bool> {
        debug!(
            post_id = %command.post_id,
            requester_id = %command.requester_id,
            "Handling confirm notice command"
        );
        self.posts
            .confirm_notice(&command.post_id, &command.requester_id)
            .await
    }
}

/// 消息查询处理器
pub struct MessagingQueryHandler {
    chat: Arc<ChatDeliveryService>,
    projection: Arc<ProjectionService>,
    ratings: Arc<RatingAggregator>,
    scheduler: LifecycleScheduler,
}

impl MessagingQueryHandler {
    pub fn new(
        chat: Arc<ChatDeliveryService>,
        projection: Arc<ProjectionService>,
        ratings: Arc<RatingAggregator>,
        scheduler: LifecycleScheduler,
    ) -> Self {
        Self {
            chat,
            projection,
            ratings,
            scheduler,
        }
    }

    pub async fn handle_list_conversation(
        &self,
        query: ListConversationQuery,
    ) -> Result<Vec<ChatMessage>> {
        debug!(
            current_user_id = %query.current_user_id,
            other_user_id = %query.other_user_id,
            "Handling list conversation query"
        );
        self.chat
            .list_conversation(&query.current_user_id, &query.other_user_id)
            .await
    }

    pub async fn handle_list_posts(&self) -> Result<Vec<PostProjection>> {
        let posts = self.projection.list_posts().await?;
        debug!(count = posts.len(), "Listed posts");
        Ok(posts)
    }

    pub async fn handle_rating_counts(&self, query: RatingCountsQuery) -> Result<RatingCounts> {
        self.ratings.rating_counts(&query.post_id).await
    }

    pub fn lifecycle_state(&self, post_id: &str) -> LifecycleState {
        self.scheduler.state(post_id)
    }

    /// 订阅生命周期事件
    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.scheduler.subscribe()
    }
}
