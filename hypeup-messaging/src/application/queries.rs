/// 会话查询
#[derive(Debug, Clone)]
pub struct ListConversationQuery {
    pub current_user_id: String,
    pub other_user_id: String,
}

/// 评分直方图查询
#[derive(Debug, Clone)]
pub struct RatingCountsQuery {
    pub post_id: String,
}
