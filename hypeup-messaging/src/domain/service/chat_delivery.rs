use std::sync::Arc;

use chrono::Utc;
use futures::TryStreamExt;
use hypeup_core::metrics::MessagingMetrics;
use hypeup_core::{HypeError, Result, ensure_arg};
use tracing::{debug, warn};

use crate::domain::model::{
    ChatDraft, ChatMessage, CostDemand, MessageKind, normalize_currency_tokens,
};
use crate::domain::repository::{ChatStoreRef, IdentityResolver};

/// 聊天投递管线：校验、规范化、持久化与会话视图
pub struct ChatDeliveryService {
    store: ChatStoreRef,
    identity: Arc<dyn IdentityResolver>,
    metrics: Arc<MessagingMetrics>,
}

impl ChatDeliveryService {
    pub fn new(
        store: ChatStoreRef,
        identity: Arc<dyn IdentityResolver>,
        metrics: Arc<MessagingMetrics>,
    ) -> Self {
        Self {
            store,
            identity,
            metrics,
        }
    }

    /// 发送聊天消息
    ///
    /// 校验失败时不触达存储；成功返回新消息 ID
    pub async fn send(&self, draft: ChatDraft) -> Result<String> {
        let mut message = validate_draft(draft)?;

        if message.sender_display_name.is_none() || message.sender_role.is_none() {
            self.fill_sender_profile(&mut message).await;
        }

        let kind = message.kind;
        let id = self.store.create(message).await.inspect_err(|e| {
            if e.is_retryable() {
                self.metrics.record_store_error("chat_create");
            }
        })?;

        self.metrics.record_chat_sent(kind.as_str());
        debug!(message_id = %id, kind = kind.as_str(), "Chat message stored");
        Ok(id)
    }

    /// 列出两人之间的会话（不区分方向），按发送时间升序
    pub async fn list_conversation(
        &self,
        current_user_id: &str,
        other_user_id: &str,
    ) -> Result<Vec<ChatMessage>> {
        ensure_arg!(
            !current_user_id.is_empty() && !other_user_id.is_empty(),
            "currentUserId and userId are required"
        );

        let mut messages: Vec<ChatMessage> = self
            .store
            .scan_all()
            .await?
            .try_filter(|(_, message)| {
                futures::future::ready(message.is_between(current_user_id, other_user_id))
            })
            .map_ok(|(_, message)| message.for_delivery())
            .try_collect()
            .await?;

        messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then_with(|| a.id.cmp(&b.id)));
        Ok(messages)
    }

    /// 删除发给 `receiver_id` 的全部消息（只按接收方删除）
    pub async fn delete_conversation_messages(&self, receiver_id: &str) -> Result<usize> {
        let targets: Vec<String> = self
            .store
            .scan_all()
            .await?
            .try_filter_map(|(id, message)| {
                futures::future::ready(Ok((message.receiver_id == receiver_id).then_some(id)))
            })
            .try_collect()
            .await?;

        let mut deleted = 0;
        for id in &targets {
            if self.store.delete(id).await? {
                deleted += 1;
            }
        }
        debug!(receiver_id = %receiver_id, deleted, "Conversation messages deleted");
        Ok(deleted)
    }

    /// 调用方未提供的发送方名称、角色从身份目录补齐；查不到时保留原样
    async fn fill_sender_profile(&self, message: &mut ChatMessage) {
        let lookup = match message.sender_role {
            Some(role) => self.identity.resolve(role, &message.sender_id).await,
            None => self.identity.resolve_any(&message.sender_id).await,
        };
        match lookup {
            Ok(Some(profile)) => {
                message.sender_display_name.get_or_insert(profile.name);
                message.sender_role.get_or_insert(profile.role);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(sender_id = %message.sender_id, error = %e, "Sender lookup failed");
            }
        }
    }
}

/// 校验原始输入并构造消息（正文金额已规范化，`sent_at` 为当前时间）
pub fn validate_draft(draft: ChatDraft) -> Result<ChatMessage> {
    ensure_arg!(!draft.sender_id.trim().is_empty(), "senderId is required");
    ensure_arg!(!draft.receiver_id.trim().is_empty(), "receiverId is required");
    ensure_arg!(!draft.body.trim().is_empty(), "message is required");

    let kind: MessageKind = draft
        .kind
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| HypeError::invalid_argument("messageType is required"))?
        .parse()?;

    let cost = match kind {
        MessageKind::Regular => {
            ensure_arg!(
                draft.cost_content.is_none() && draft.cost_amount.is_none(),
                "regular messages must not carry messageContent or expectedCost"
            );
            None
        }
        MessageKind::Reply => match (draft.cost_content, draft.cost_amount) {
            (Some(content), Some(amount)) if !content.trim().is_empty() => Some(CostDemand {
                cost_content: content,
                cost_amount: amount,
            }),
            _ => {
                return Err(HypeError::invalid_argument(
                    "messageContent and expectedCost are required for non-regular messages",
                ));
            }
        },
    };

    Ok(ChatMessage {
        id: String::new(),
        sender_id: draft.sender_id,
        receiver_id: draft.receiver_id,
        body: normalize_currency_tokens(&draft.body),
        sent_at: Utc::now(),
        kind,
        sender_display_name: draft.sender_display_name.filter(|n| !n.is_empty()),
        sender_role: draft.sender_role,
        cost,
    })
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::domain::model::Role;
    use crate::domain::repository::MessageStore;
    use crate::infrastructure::identity::InMemoryIdentityDirectory;
    use crate::infrastructure::persistence::InMemoryMessageStore;

    fn draft(kind: Option<&str>, content: Option<&str>, amount: Option<u64>) -> ChatDraft {
        ChatDraft {
            sender_id: "a".to_string(),
            receiver_id: "b".to_string(),
            body: "deal at 250".to_string(),
            kind: kind.map(str::to_string),
            cost_content: content.map(str::to_string),
            cost_amount: amount,
            ..ChatDraft::default()
        }
    }

    fn service() -> (ChatDeliveryService, Arc<InMemoryMessageStore<ChatMessage>>) {
        let store = Arc::new(InMemoryMessageStore::<ChatMessage>::new());
        let identity = Arc::new(
            InMemoryIdentityDirectory::new().with_profile(Role::Promoter, "a", "Hype Co"),
        );
        let service = ChatDeliveryService::new(
            store.clone(),
            identity,
            Arc::new(MessagingMetrics::new().unwrap()),
        );
        (service, store)
    }

    #[test]
    fn test_kind_and_cost_fields_must_agree() {
        let kinds = [None, Some("regular"), Some("reply"), Some("bogus")];
        let contents = [None, Some("promo")];
        let amounts = [None, Some(50u64)];

        for kind in kinds {
            for content in contents {
                for amount in amounts {
                    let consistent = match kind {
                        Some("regular") => content.is_none() && amount.is_none(),
                        Some("reply") => content.is_some() && amount.is_some(),
                        _ => false,
                    };
                    let result = validate_draft(draft(kind, content, amount));
                    assert_eq!(
                        result.is_ok(),
                        consistent,
                        "kind={:?} content={:?} amount={:?}",
                        kind,
                        content,
                        amount
                    );
                    if let Err(e) = result {
                        assert!(matches!(e, HypeError::InvalidArgument(_)));
                    }
                }
            }
        }
    }

    #[test]
    fn test_body_amounts_normalized() {
        let message = validate_draft(draft(Some("regular"), None, None)).unwrap();
        assert_eq!(message.body, "deal at $250");
    }

    #[tokio::test]
    async fn test_rejected_send_leaves_store_untouched() {
        let (service, store) = service();
        let err = service
            .send(draft(Some("reply"), None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, HypeError::InvalidArgument(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_send_fills_sender_profile() {
        let (service, _) = service();
        service
            .send(draft(Some("reply"), Some("promo"), Some(50)))
            .await
            .unwrap();

        let messages = service.list_conversation("b", "a").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender_display_name.as_deref(), Some("Hype Co"));
        assert_eq!(messages[0].sender_role, Some(Role::Promoter));
        assert_eq!(messages[0].cost.as_ref().unwrap().cost_amount, 50);
    }

    #[tokio::test]
    async fn test_list_requires_both_ids() {
        let (service, _) = service();
        assert!(service.list_conversation("", "a").await.is_err());
    }

    fn stored(sender: &str, receiver: &str, body: &str, sent_at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: String::new(),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            body: body.to_string(),
            sent_at,
            kind: MessageKind::Regular,
            sender_display_name: None,
            sender_role: None,
            cost: None,
        }
    }

    #[tokio::test]
    async fn test_conversation_sorted_by_sent_at_not_insertion() {
        let (service, store) = service();
        let base = Utc::now();

        // 先写入较晚的消息，ID 顺序与时间顺序相反
        let late = store
            .create(stored("a", "b", "late", base + chrono::Duration::minutes(5)))
            .await
            .unwrap();
        let early = store
            .create(stored("b", "a", "early", base - chrono::Duration::minutes(5)))
            .await
            .unwrap();
        let middle = store.create(stored("a", "b", "middle", base)).await.unwrap();
        store
            .create(stored("a", "c", "elsewhere", base))
            .await
            .unwrap();
        assert!(late < early);

        let messages = service.list_conversation("a", "b").await.unwrap();
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![early.as_str(), middle.as_str(), late.as_str()]);
        assert!(messages.windows(2).all(|w| w[0].sent_at <= w[1].sent_at));
    }
}
