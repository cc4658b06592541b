use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use hypeup_core::HypeError;
use serde::{Deserialize, Serialize};

use super::Role;

/// 聊天消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// 普通消息，不携带议价信息
    Regular,
    /// 对帖子的回复，携带议价信息
    Reply,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Regular => "regular",
            MessageKind::Reply => "reply",
        }
    }

    pub fn is_regular(&self) -> bool {
        matches!(self, MessageKind::Regular)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = HypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(MessageKind::Regular),
            "reply" => Ok(MessageKind::Reply),
            other => Err(HypeError::invalid_argument(format!(
                "unknown message kind '{}'",
                other
            ))),
        }
    }
}

/// 议价信息：仅 reply 消息携带
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostDemand {
    #[serde(rename = "messageContent")]
    pub cost_content: String,
    #[serde(rename = "expectedCost")]
    pub cost_amount: u64,
}

/// 聊天消息记录
///
/// 字段名沿用客户端既有的线上格式（`message`、`time`、`messageType` 等）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "time")]
    pub sent_at: DateTime<Utc>,
    #[serde(rename = "messageType")]
    pub kind: MessageKind,
    #[serde(rename = "senderName", default, skip_serializing_if = "Option::is_none")]
    pub sender_display_name: Option<String>,
    #[serde(rename = "senderType", default, skip_serializing_if = "Option::is_none")]
    pub sender_role: Option<Role>,
    #[serde(flatten)]
    pub cost: Option<CostDemand>,
}

impl ChatMessage {
    /// 是否属于 (a, b) 之间的会话（不区分方向）
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }

    /// 对外投影：regular 消息不暴露议价字段
    pub fn for_delivery(mut self) -> Self {
        if self.kind.is_regular() {
            self.cost = None;
        }
        self
    }
}

/// 待发送的聊天消息（未校验的原始输入）
#[derive(Debug, Clone, Default)]
pub struct ChatDraft {
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub kind: Option<String>,
    pub sender_display_name: Option<String>,
    pub sender_role: Option<Role>,
    pub cost_content: Option<String>,
    pub cost_amount: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: MessageKind, cost: Option<CostDemand>) -> ChatMessage {
        ChatMessage {
            id: "m1".to_string(),
            sender_id: "a".to_string(),
            receiver_id: "b".to_string(),
            body: "hi".to_string(),
            sent_at: Utc::now(),
            kind,
            sender_display_name: None,
            sender_role: None,
            cost,
        }
    }

    #[test]
    fn test_reply_serializes_cost_fields_inline() {
        let msg = sample(
            MessageKind::Reply,
            Some(CostDemand {
                cost_content: "two stories".to_string(),
                cost_amount: 120,
            }),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["messageType"], "reply");
        assert_eq!(json["message"], "hi");
        assert_eq!(json["messageContent"], "two stories");
        assert_eq!(json["expectedCost"], 120);

        let back: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_regular_projection_strips_cost() {
        let msg = sample(
            MessageKind::Regular,
            Some(CostDemand {
                cost_content: "legacy".to_string(),
                cost_amount: 5,
            }),
        )
        .for_delivery();
        assert!(msg.cost.is_none());
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("messageContent").is_none());
        assert!(json.get("expectedCost").is_none());
    }

    #[test]
    fn test_is_between_ignores_direction() {
        let msg = sample(MessageKind::Regular, None);
        assert!(msg.is_between("a", "b"));
        assert!(msg.is_between("b", "a"));
        assert!(!msg.is_between("a", "c"));
    }
}
