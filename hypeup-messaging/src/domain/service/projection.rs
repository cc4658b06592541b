use futures::TryStreamExt;
use hypeup_core::Result;

use crate::domain::model::PostProjection;
use crate::domain::repository::PostStoreRef;

/// 帖子读模型：按插入顺序返回全部帖子的投影
pub struct ProjectionService {
    store: PostStoreRef,
}

impl ProjectionService {
    pub fn new(store: PostStoreRef) -> Self {
        Self { store }
    }

    pub async fn list_posts(&self) -> Result<Vec<PostProjection>> {
        self.store
            .scan_all()
            .await?
            .map_ok(|(_, post)| PostProjection::from(post))
            .try_collect()
            .await
    }
}
