use std::sync::Arc;

use hypeup_core::metrics::MessagingMetrics;
use hypeup_core::{HypeError, Result};
use tracing::debug;

use crate::domain::model::{PostedMessage, RatingCounts, RatingOutcome, Star};
use crate::domain::repository::PostStoreRef;
use crate::domain::service::KeyedLocks;

/// 评分聚合器
///
/// 同一帖子的评分读-改-写经由 [`KeyedLocks`] 串行化，直方图每次从评分表全量重算
pub struct RatingAggregator {
    store: PostStoreRef,
    locks: Arc<KeyedLocks>,
    metrics: Arc<MessagingMetrics>,
}

impl RatingAggregator {
    pub fn new(store: PostStoreRef, locks: Arc<KeyedLocks>, metrics: Arc<MessagingMetrics>) -> Self {
        Self {
            store,
            locks,
            metrics,
        }
    }

    /// 评分或撤销评分，返回更新后的帖子
    pub async fn apply_rating(
        &self,
        post_id: &str,
        rater_id: &str,
        star: i64,
    ) -> Result<(PostedMessage, RatingOutcome)> {
        let star = Star::new(star)?;
        if rater_id.trim().is_empty() {
            return Err(HypeError::invalid_argument("userId is required"));
        }

        let _guard = self.locks.acquire(post_id).await;

        let mut post = self.store.get(post_id).await?;
        let outcome = post.toggle_rating(rater_id, star);

        if let Err(e) = self.store.update(post_id, post.clone()).await {
            if e.is_retryable() {
                self.metrics.record_store_error("rating_update");
            }
            return Err(e);
        }

        self.metrics.record_rating(outcome.as_str());
        debug!(
            post_id = %post_id,
            rater_id = %rater_id,
            star = star.value(),
            outcome = outcome.as_str(),
            raters = post.ratings.len(),
            "Rating applied"
        );

        Ok((post, outcome))
    }

    /// 读取直方图（纯投影）
    pub async fn rating_counts(&self, post_id: &str) -> Result<RatingCounts> {
        let post = self.store.get(post_id).await?;
        Ok(RatingCounts::from_values(post.ratings.values()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::domain::model::Role;
    use crate::domain::repository::MessageStore;
    use crate::infrastructure::persistence::InMemoryMessageStore;

    async fn setup() -> (RatingAggregator, PostStoreRef, String) {
        let store: PostStoreRef = Arc::new(InMemoryMessageStore::<PostedMessage>::new());
        let post = PostedMessage {
            id: String::new(),
            content: "promo".to_string(),
            cost: 50,
            receiver_id: "owner".to_string(),
            sender_name: "Ada".to_string(),
            role: Role::User,
            release_date: Utc::now(),
            images: vec![],
            ratings: BTreeMap::new(),
            rating_counts: RatingCounts::default(),
            created_at: Utc::now(),
            notice_at: None,
            scheduled_delete_at: None,
        };
        let id = store.create(post).await.unwrap();
        let aggregator = RatingAggregator::new(
            store.clone(),
            Arc::new(KeyedLocks::new()),
            Arc::new(MessagingMetrics::new().unwrap()),
        );
        (aggregator, store, id)
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_star_before_lookup() {
        let (aggregator, _, _) = setup().await;
        let err = aggregator.apply_rating("missing", "u1", 7).await.unwrap_err();
        assert!(matches!(err, HypeError::InvalidArgument(_)));

        let err = aggregator.apply_rating("missing", "u1", 3).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_toggle_persists_counts() {
        let (aggregator, store, id) = setup().await;

        let (post, outcome) = aggregator.apply_rating(&id, "u1", 4).await.unwrap();
        assert_eq!(outcome, RatingOutcome::Added);
        assert_eq!(post.rating_counts, RatingCounts([0, 0, 0, 1, 0]));

        let (post, outcome) = aggregator.apply_rating(&id, "u1", 4).await.unwrap();
        assert_eq!(outcome, RatingOutcome::Removed);
        assert!(post.ratings.is_empty());

        let stored = store.get(&id).await.unwrap();
        assert_eq!(stored.rating_counts, RatingCounts::default());
        assert_eq!(
            aggregator.rating_counts(&id).await.unwrap(),
            RatingCounts::default()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_raters_do_not_lose_updates() {
        let (aggregator, store, id) = setup().await;
        let aggregator = Arc::new(aggregator);

        let mut handles = Vec::new();
        for i in 0..40 {
            let aggregator = aggregator.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                let star = (i % 5) as i64 + 1;
                aggregator
                    .apply_rating(&id, &format!("rater-{}", i), star)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = store.get(&id).await.unwrap();
        assert_eq!(stored.ratings.len(), 40);
        assert_eq!(stored.rating_counts, RatingCounts([8, 8, 8, 8, 8]));
        assert_eq!(stored.rating_counts.raters() as usize, stored.ratings.len());
    }
}
