use crate::domain::model::{ChatDraft, PostDraft};

/// 发送聊天消息命令
#[derive(Debug, Clone)]
pub struct SendChatMessageCommand {
    pub draft: ChatDraft,
}

/// 删除发给某人的全部聊天消息
#[derive(Debug, Clone)]
pub struct DeleteConversationMessagesCommand {
    pub sender_id: String,
    pub receiver_id: String,
}

/// 发帖命令
#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub draft: PostDraft,
}

/// 评分命令
#[derive(Debug, Clone)]
pub struct RatePostCommand {
    pub post_id: String,
    pub rater_id: String,
    pub star: i64,
}

/// 发帖人删除帖子命令
#[derive(Debug, Clone)]
pub struct DeletePostCommand {
    pub post_id: String,
    pub requester_id: String,
}

/// 确认删除提醒命令
#[derive(Debug, Clone)]
pub struct ConfirmNoticeCommand {
    pub post_id: String,
    pub requester_id: String,
}
