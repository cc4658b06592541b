use chrono::{DateTime, Utc};
use serde::Serialize;

/// 帖子生命周期状态
///
/// 状态由调度器中定时器是否存在推导，不持久化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    NoticePending,
    Deleted,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::NoticePending => "notice_pending",
            LifecycleState::Deleted => "deleted",
        }
    }
}

/// 删除原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionReason {
    /// 存活期满
    Expired,
    /// 发帖人确认了删除提醒
    NoticeConfirmed,
    /// 发帖人主动删除
    OwnerRequested,
    /// 服务停机期间已过期，启动恢复时清理
    ExpiredWhileOffline,
}

impl DeletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionReason::Expired => "expired",
            DeletionReason::NoticeConfirmed => "notice_confirmed",
            DeletionReason::OwnerRequested => "owner_requested",
            DeletionReason::ExpiredWhileOffline => "expired_while_offline",
        }
    }
}

/// 推送给发帖人的生命周期事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    #[serde(rename_all = "camelCase")]
    DeletionNotice {
        post_id: String,
        owner_id: String,
        delete_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    PostDeleted {
        post_id: String,
        owner_id: String,
        reason: DeletionReason,
    },
}

impl LifecycleEvent {
    pub fn owner_id(&self) -> &str {
        match self {
            LifecycleEvent::DeletionNotice { owner_id, .. }
            | LifecycleEvent::PostDeleted { owner_id, .. } => owner_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::DeletionNotice { .. } => "deletion_notice",
            LifecycleEvent::PostDeleted { .. } => "post_deleted",
        }
    }
}
