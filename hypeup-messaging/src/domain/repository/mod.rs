use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use hypeup_core::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::model::{ChatMessage, PostedMessage, Role, SenderProfile};

/// 可存入消息存储的记录
pub trait StoredRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// 集合名称（Redis 中作为 hash 键后缀）
    const COLLECTION: &'static str;

    fn record_id(&self) -> &str;

    fn assign_id(&mut self, id: String);
}

impl StoredRecord for ChatMessage {
    const COLLECTION: &'static str = "chats";

    fn record_id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }
}

impl StoredRecord for PostedMessage {
    const COLLECTION: &'static str = "messages";

    fn record_id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }
}

/// 全量扫描得到的 (id, record) 流
pub type RecordStream<R> = BoxStream<'static, Result<(String, R)>>;

/// 消息存储接口（需要作为 trait 对象使用，保留 async-trait）
///
/// 写操作对单条记录原子；后端故障统一映射为 `StoreUnavailable`
#[async_trait]
pub trait MessageStore<R: StoredRecord>: Send + Sync {
    /// 分配新 ID 并写入，永不覆盖已有记录
    async fn create(&self, record: R) -> Result<String>;

    /// 读取记录，不存在时返回 `NotFound`
    async fn get(&self, id: &str) -> Result<R>;

    /// 扫描集合内全部记录（按插入顺序）
    async fn scan_all(&self) -> Result<RecordStream<R>>;

    /// 整体替换已有记录，不存在时返回 `NotFound`
    async fn update(&self, id: &str, record: R) -> Result<()>;

    /// 删除记录；幂等，返回是否确实删除了记录
    async fn delete(&self, id: &str) -> Result<bool>;
}

pub type ChatStoreRef = Arc<dyn MessageStore<ChatMessage>>;
pub type PostStoreRef = Arc<dyn MessageStore<PostedMessage>>;

/// 身份目录：从用户/推广者注册表解析显示名
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, role: Role, id: &str) -> Result<Option<SenderProfile>>;

    /// 不知道角色时依次查找用户、推广者
    async fn resolve_any(&self, id: &str) -> Result<Option<SenderProfile>> {
        if let Some(profile) = self.resolve(Role::User, id).await? {
            return Ok(Some(profile));
        }
        self.resolve(Role::Promoter, id).await
    }
}

/// 帖子图片存储
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 写入对象并返回可访问的 URL
    async fn put(&self, object_name: &str, payload: &[u8], content_type: &str) -> Result<String>;

    /// 删除对象；对象不存在时视为成功
    async fn delete(&self, object_name: &str) -> Result<()>;
}
