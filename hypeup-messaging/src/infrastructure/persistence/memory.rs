use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use hypeup_core::{HypeError, Result, new_message_id};
use tokio::sync::RwLock;

use crate::domain::repository::{MessageStore, RecordStream, StoredRecord};

/// 进程内消息存储
///
/// ID 使用 ULID，BTreeMap 的键序即插入顺序
pub struct InMemoryMessageStore<R> {
    inner: Arc<RwLock<BTreeMap<String, R>>>,
}

impl<R> Default for InMemoryMessageStore<R> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl<R> InMemoryMessageStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl<R: StoredRecord> MessageStore<R> for InMemoryMessageStore<R> {
    async fn create(&self, mut record: R) -> Result<String> {
        let id = new_message_id();
        record.assign_id(id.clone());

        let mut guard = self.inner.write().await;
        if guard.contains_key(&id) {
            return Err(HypeError::conflict(format!("message id {} already exists", id)));
        }
        guard.insert(id.clone(), record);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<R> {
        let guard = self.inner.read().await;
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| HypeError::not_found(format!("Message {} not found", id)))
    }

    async fn scan_all(&self) -> Result<RecordStream<R>> {
        let snapshot: Vec<Result<(String, R)>> = {
            let guard = self.inner.read().await;
            guard
                .iter()
                .map(|(id, record)| Ok((id.clone(), record.clone())))
                .collect()
        };
        Ok(Box::pin(stream::iter(snapshot)))
    }

    async fn update(&self, id: &str, mut record: R) -> Result<()> {
        let mut guard = self.inner.write().await;
        match guard.get_mut(id) {
            Some(slot) => {
                record.assign_id(id.to_string());
                *slot = record;
                Ok(())
            }
            None => Err(HypeError::not_found(format!("Message {} not found", id))),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut guard = self.inner.write().await;
        Ok(guard.remove(id).is_some())
    }
}
