use std::collections::HashMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use futures::stream;
use hypeup_core::{HypeError, Result, StoreResultExt, new_message_id};
use redis::{AsyncCommands, ConnectionInfo, IntoConnectionInfo, aio::ConnectionManager};
use tracing::warn;

use crate::domain::repository::{MessageStore, RecordStream, StoredRecord};

/// Redis 消息存储
///
/// 每个集合一个 hash：`{prefix}:{collection}`，field 为消息 ID，value 为 JSON
pub struct RedisMessageStore<R> {
    conn: ConnectionManager,
    key: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: StoredRecord> RedisMessageStore<R> {
    pub fn new(conn: ConnectionManager, key_prefix: &str) -> Self {
        Self {
            conn,
            key: collection_key(key_prefix, R::COLLECTION),
            _record: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn encode(record: &R) -> Result<String> {
        serde_json::to_string(record).store_context("encode")
    }

    fn decode(id: &str, raw: &str) -> Result<R> {
        serde_json::from_str::<R>(raw).map_err(|e| {
            HypeError::store(
                "decode",
                format!("malformed record {} in {}: {}", id, R::COLLECTION, e),
            )
        })
    }
}

/// 集合对应的 Redis 键
pub fn collection_key(prefix: &str, collection: &str) -> String {
    format!("{}:{}", prefix, collection)
}

/// 解析连接地址；`database` 给出时覆盖 URL 中的库编号
pub fn connection_info(url: &str, database: Option<u32>) -> Result<ConnectionInfo> {
    let mut info = url.into_connection_info().store_context("connect")?;
    if let Some(db) = database {
        info.redis.db = i64::from(db);
    }
    Ok(info)
}

/// 建立共享的 Redis 连接
pub async fn connect(url: &str, database: Option<u32>) -> Result<ConnectionManager> {
    let client = redis::Client::open(connection_info(url, database)?).store_context("connect")?;
    ConnectionManager::new(client).await.store_context("connect")
}

#[async_trait]
impl<R: StoredRecord> MessageStore<R> for RedisMessageStore<R> {
    async fn create(&self, mut record: R) -> Result<String> {
        let id = new_message_id();
        record.assign_id(id.clone());
        let payload = Self::encode(&record)?;

        let mut conn = self.conn.clone();
        let inserted: bool = conn
            .hset_nx(&self.key, &id, payload)
            .await
            .store_context("create")?;
        if !inserted {
            return Err(HypeError::conflict(format!("message id {} already exists", id)));
        }
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<R> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(&self.key, id).await.store_context("get")?;
        match raw {
            Some(raw) => Self::decode(id, &raw),
            None => Err(HypeError::not_found(format!("Message {} not found", id))),
        }
    }

    async fn scan_all(&self) -> Result<RecordStream<R>> {
        let mut conn = self.conn.clone();
        let entries: HashMap<String, String> =
            conn.hgetall(&self.key).await.store_context("scan")?;

        let mut ids: Vec<&String> = entries.keys().collect();
        ids.sort();

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match Self::decode(id, &entries[id]) {
                Ok(record) => records.push(Ok((id.clone(), record))),
                Err(e) => {
                    warn!(key = %self.key, message_id = %id, error = %e, "Skipping malformed record");
                }
            }
        }
        Ok(Box::pin(stream::iter(records)))
    }

    async fn update(&self, id: &str, mut record: R) -> Result<()> {
        record.assign_id(id.to_string());
        let payload = Self::encode(&record)?;

        let mut conn = self.conn.clone();
        let exists: bool = conn.hexists(&self.key, id).await.store_context("update")?;
        if !exists {
            return Err(HypeError::not_found(format!("Message {} not found", id)));
        }
        let _: () = conn
            .hset(&self.key, id, payload)
            .await
            .store_context("update")?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.hdel(&self.key, id).await.store_context("delete")?;
        Ok(removed > 0)
    }
}
