use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use hypeup_core::metrics::MessagingMetrics;
use hypeup_core::{HypeError, Result, current_millis};
use tracing::{error, info, warn};

use crate::domain::model::{
    DeletionReason, MediaUpload, PostDraft, PostedMessage, RatingCounts, Role,
};
use crate::domain::repository::{BlobStore, IdentityResolver, PostStoreRef};
use crate::domain::service::LifecycleScheduler;

/// 帖子图片的存储目录
pub const POSTED_IMAGES_DIR: &str = "postedimages";

/// 帖子领域服务：发帖、发帖人删除、确认删除提醒
pub struct PostDomainService {
    store: PostStoreRef,
    identity: Arc<dyn IdentityResolver>,
    blobs: Option<Arc<dyn BlobStore>>,
    scheduler: LifecycleScheduler,
    metrics: Arc<MessagingMetrics>,
}

impl PostDomainService {
    pub fn new(
        store: PostStoreRef,
        identity: Arc<dyn IdentityResolver>,
        blobs: Option<Arc<dyn BlobStore>>,
        scheduler: LifecycleScheduler,
        metrics: Arc<MessagingMetrics>,
    ) -> Self {
        Self {
            store,
            identity,
            blobs,
            scheduler,
            metrics,
        }
    }

    /// 发帖并登记生命周期定时器
    pub async fn create_post(&self, draft: PostDraft) -> Result<PostedMessage> {
        let now = Utc::now();
        let release_date = parse_release_date(draft.release_date.as_deref(), now)?;

        let role = draft
            .role
            .as_deref()
            .and_then(|r| r.parse::<Role>().ok())
            .filter(|_| !draft.receiver_id.trim().is_empty())
            .ok_or_else(|| HypeError::invalid_argument("Invalid user type or receiver ID"))?;

        // 名额在第一个 await 之前占用，任何失败路径上随 `_slot` 丢弃而释放
        let _slot = self.scheduler.reserve_owner(&draft.receiver_id)?;

        let profile = self
            .identity
            .resolve(role, &draft.receiver_id)
            .await?
            .ok_or_else(|| {
                HypeError::not_found(format!("{} {} not found", role, draft.receiver_id))
            })?;

        let mut images = draft.images;
        let mut uploaded = None;
        if let Some(media) = draft.media.as_ref() {
            let (object_name, url) = self.upload_media(&draft.receiver_id, media).await?;
            images.push(url);
            uploaded = Some(object_name);
        }

        let (notice_at, delete_at) = self.scheduler.config().deadlines_from(now);
        let mut post = PostedMessage {
            id: String::new(),
            content: draft.content,
            cost: draft.cost,
            receiver_id: draft.receiver_id,
            sender_name: profile.name,
            role,
            release_date,
            images,
            ratings: Default::default(),
            rating_counts: RatingCounts::default(),
            created_at: now,
            notice_at: Some(notice_at),
            scheduled_delete_at: Some(delete_at),
        };

        let id = match self.store.create(post.clone()).await {
            Ok(id) => id,
            Err(e) => {
                if e.is_retryable() {
                    self.metrics.record_store_error("post_create");
                }
                if let Some(object_name) = uploaded {
                    self.discard_media(&object_name).await;
                }
                return Err(e);
            }
        };
        post.id = id;

        self.scheduler.register(&post);
        self.metrics.record_post_created(role.as_str());
        info!(
            post_id = %post.id,
            owner_id = %post.receiver_id,
            role = role.as_str(),
            images = post.images.len(),
            "Post created"
        );
        Ok(post)
    }

    /// 发帖人主动删除；帖子不存在时视为成功
    pub async fn delete_post(&self, post_id: &str, requester_id: &str) -> Result<bool> {
        let Some(post) = self.owned_post(post_id, requester_id).await? else {
            return Ok(false);
        };
        self.scheduler
            .cancel_and_delete(post_id, post.owner_id(), DeletionReason::OwnerRequested)
            .await
    }

    /// 发帖人确认删除提醒，立即删除
    pub async fn confirm_notice(&self, post_id: &str, requester_id: &str) -> Result<bool> {
        let Some(post) = self.owned_post(post_id, requester_id).await? else {
            return Ok(false);
        };
        self.scheduler.confirm_notice(post_id, post.owner_id()).await
    }

    async fn owned_post(&self, post_id: &str, requester_id: &str) -> Result<Option<PostedMessage>> {
        if requester_id.trim().is_empty() {
            return Err(HypeError::unauthorized("requesterId is required"));
        }
        let post = match self.store.get(post_id).await {
            Ok(post) => post,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        if post.owner_id() != requester_id {
            warn!(post_id = %post_id, requester_id = %requester_id, "Rejected non-owner request");
            return Err(HypeError::unauthorized(format!(
                "{} does not own post {}",
                requester_id, post_id
            )));
        }
        Ok(Some(post))
    }

    /// 上传图片，返回 (对象名, URL)
    async fn upload_media(&self, owner_id: &str, media: &MediaUpload) -> Result<(String, String)> {
        let blobs = self
            .blobs
            .as_ref()
            .ok_or_else(|| HypeError::invalid_argument("image uploads are not enabled"))?;
        let name = media_object_name(owner_id, current_millis(), &media.original_name);
        let url = blobs.put(&name, &media.bytes, &media.content_type).await?;
        Ok((name, url))
    }

    async fn discard_media(&self, object_name: &str) {
        let Some(blobs) = self.blobs.as_ref() else {
            return;
        };
        match blobs.delete(object_name).await {
            Ok(()) => warn!(object_name = %object_name, "Removed media of failed post"),
            Err(e) => error!(
                object_name = %object_name,
                error = %e,
                "Failed to remove orphaned post media"
            ),
        }
    }
}

/// 图片对象名：`postedimages/{ownerId}_{unixMillis}_{originalName}`
pub fn media_object_name(owner_id: &str, unix_millis: i64, original_name: &str) -> String {
    let file_name = original_name
        .rsplit(['/', '\\'])
        .next()
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .unwrap_or("upload");
    format!("{}/{}_{}_{}", POSTED_IMAGES_DIR, owner_id, unix_millis, file_name)
}

/// 解析发布日期：必填，RFC 3339 或 `YYYY-MM-DD`，且不早于今天（按 UTC 日期比较）
pub fn parse_release_date(raw: Option<&str>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let raw = raw
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| HypeError::invalid_argument("Release date is required"))?;

    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN).and_utc())
        })
        .map_err(|_| HypeError::invalid_argument("Invalid release date format"))?;

    if parsed.date_naive() < now.date_naive() {
        return Err(HypeError::invalid_argument(
            "Release date cannot be in the past",
        ));
    }
    Ok(parsed)
}
