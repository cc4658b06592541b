//! 领域模型
//!
//! 聊天消息、帖子（hype post）、评分直方图与生命周期状态

mod body;
mod chat;
mod lifecycle;
mod post;

use std::fmt;
use std::str::FromStr;

use hypeup_core::HypeError;
use serde::{Deserialize, Serialize};

pub use body::{BodySegment, body_segments, normalize_currency_tokens};
pub use chat::{ChatDraft, ChatMessage, CostDemand, MessageKind};
pub use lifecycle::{DeletionReason, LifecycleEvent, LifecycleState};
pub use post::{
    COST_STEP, DraftCost, MediaUpload, PostDraft, PostProjection, PostedMessage, RatingCounts,
    RatingOutcome, STAR_LEVELS, Star,
};

/// 身份角色：决定从哪个注册表解析发送方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Promoter,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Promoter => "promoter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = HypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "promoter" => Ok(Role::Promoter),
            other => Err(HypeError::invalid_argument(format!(
                "unknown role '{}'",
                other
            ))),
        }
    }
}

/// 从用户/推广者注册表解析出的发送方信息（写入时反范式化保存）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderProfile {
    pub id: String,
    pub name: String,
    pub role: Role,
}
