//! 帖子生命周期调度器
//!
//! 每个帖子一个定时任务：Active 到 NoticePending 再到 Deleted。
//! 定时器登记在 `timers` 中，移除登记即取消（取消通道的发送端随之释放）。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::TryStreamExt;
use hypeup_core::metrics::MessagingMetrics;
use hypeup_core::{HypeError, Result, duration_until};
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::model::{DeletionReason, LifecycleEvent, LifecycleState, PostedMessage};
use crate::domain::repository::PostStoreRef;
use crate::domain::service::KeyedLocks;

/// 发帖名额占位值前缀（帖子 ID 为 ULID，不会与之冲突）
const RESERVED_PREFIX: &str = "reserved:";

/// 定时删除失败后两次重试之间的间隔
const DELETE_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// 生命周期配置
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// 发帖后多久发出删除提醒
    pub notice_offset: Duration,
    /// 帖子总存活时间
    pub total_lifetime: Duration,
    /// 定时删除失败后的重试次数（0 表示记录日志后放弃）
    pub delete_retry_attempts: u32,
    /// 同一发帖人同时只能有一个存活帖子
    pub enforce_posting_cooldown: bool,
    /// 事件广播通道容量
    pub event_capacity: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            notice_offset: Duration::from_secs(55 * 60),
            total_lifetime: Duration::from_secs(60 * 60),
            delete_retry_attempts: 1,
            enforce_posting_cooldown: true,
            event_capacity: 256,
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.notice_offset >= self.total_lifetime {
            return Err(HypeError::invalid_argument(format!(
                "notice offset ({:?}) must be shorter than total lifetime ({:?})",
                self.notice_offset, self.total_lifetime
            )));
        }
        if self.event_capacity == 0 {
            return Err(HypeError::invalid_argument(
                "notice channel capacity must be positive",
            ));
        }
        Ok(())
    }

    /// 由创建时间推算 (提醒时间, 删除时间)
    pub fn deadlines_from(&self, created_at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            created_at + to_chrono(self.notice_offset),
            created_at + to_chrono(self.total_lifetime),
        )
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(duration.as_millis() as i64)
}

/// 启动恢复结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub rescheduled: usize,
    pub expired: usize,
    pub failed: usize,
}

struct TimerEntry {
    owner_id: String,
    state: LifecycleState,
    delete_at: DateTime<Utc>,
    generation: u64,
    _cancel: oneshot::Sender<()>,
}

struct SchedulerInner {
    store: PostStoreRef,
    locks: Arc<KeyedLocks>,
    config: LifecycleConfig,
    timers: DashMap<String, TimerEntry>,
    /// 发帖人 -> 当前存活帖子
    active_owners: DashMap<String, String>,
    events: broadcast::Sender<LifecycleEvent>,
    metrics: Arc<MessagingMetrics>,
    generation: AtomicU64,
}

/// 生命周期调度器
#[derive(Clone)]
pub struct LifecycleScheduler {
    inner: Arc<SchedulerInner>,
}

impl LifecycleScheduler {
    pub fn new(
        store: PostStoreRef,
        locks: Arc<KeyedLocks>,
        config: LifecycleConfig,
        metrics: Arc<MessagingMetrics>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                locks,
                config,
                timers: DashMap::new(),
                active_owners: DashMap::new(),
                events,
                metrics,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.inner.config
    }

    /// 订阅生命周期事件（删除提醒、删除完成）
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.events.subscribe()
    }

    /// 为新帖子登记定时器，同一 ID 的旧定时器被替换
    pub fn register(&self, post: &PostedMessage) {
        let (notice_at, delete_at) = self.inner.deadlines(post);
        self.inner.arm(
            post.id.clone(),
            post.owner_id().to_string(),
            notice_at,
            delete_at,
        );
        debug!(
            post_id = %post.id,
            owner_id = %post.owner_id(),
            notice_at = %notice_at,
            delete_at = %delete_at,
            "Lifecycle timer registered"
        );
    }

    /// 占用发帖人的发帖名额：仍有存活帖子或正在发帖时返回 `Conflict`
    ///
    /// 名额在 `register` 时绑定到新帖子；未绑定前丢弃返回值即释放
    pub fn reserve_owner(&self, owner_id: &str) -> Result<OwnerReservation> {
        if !self.inner.config.enforce_posting_cooldown {
            return Ok(OwnerReservation { slot: None });
        }
        match self.inner.active_owners.entry(owner_id.to_string()) {
            Entry::Occupied(live) if live.get().starts_with(RESERVED_PREFIX) => {
                Err(HypeError::conflict(format!(
                    "owner {} is already creating a post",
                    owner_id
                )))
            }
            Entry::Occupied(live) => Err(HypeError::conflict(format!(
                "owner {} already has a live post {}",
                owner_id,
                live.get()
            ))),
            Entry::Vacant(slot) => {
                let marker = format!(
                    "{}{}",
                    RESERVED_PREFIX,
                    self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
                );
                slot.insert(marker.clone());
                Ok(OwnerReservation {
                    slot: Some((Arc::clone(&self.inner), owner_id.to_string(), marker)),
                })
            }
        }
    }

    /// 当前状态；没有定时器即视为已删除
    pub fn state(&self, post_id: &str) -> LifecycleState {
        self.inner
            .timers
            .get(post_id)
            .map(|entry| entry.state)
            .unwrap_or(LifecycleState::Deleted)
    }

    pub fn live_timers(&self) -> usize {
        self.inner.timers.len()
    }

    /// 立即删除帖子并取消其定时器
    ///
    /// 存储错误直接返回，定时器保持不变；返回是否确实删除了记录
    pub async fn cancel_and_delete(
        &self,
        post_id: &str,
        owner_id: &str,
        reason: DeletionReason,
    ) -> Result<bool> {
        let removed = match self.inner.delete_locked(post_id).await {
            Ok(removed) => removed,
            Err(e) => {
                self.inner.metrics.record_store_error("lifecycle_delete");
                return Err(e);
            }
        };

        if let Some((_, entry)) = self.inner.timers.remove(post_id) {
            self.inner.sync_gauge();
            let transition = match entry.state {
                LifecycleState::NoticePending => "notice_pending_to_deleted",
                _ => "active_to_deleted",
            };
            self.inner.metrics.record_transition(transition);
        }
        self.inner.release_owner(owner_id, post_id);

        if removed {
            self.inner.emit(LifecycleEvent::PostDeleted {
                post_id: post_id.to_string(),
                owner_id: owner_id.to_string(),
                reason,
            });
        }
        info!(
            post_id = %post_id,
            owner_id = %owner_id,
            reason = reason.as_str(),
            removed,
            "Post deleted ahead of schedule"
        );
        Ok(removed)
    }

    /// 发帖人确认删除提醒：仅 NoticePending 状态有效
    pub async fn confirm_notice(&self, post_id: &str, owner_id: &str) -> Result<bool> {
        let state = self.inner.timers.get(post_id).map(|entry| entry.state);
        if state == Some(LifecycleState::Active) {
            return Err(HypeError::invalid_argument(format!(
                "no deletion notice has been issued for post {}",
                post_id
            )));
        }
        self.cancel_and_delete(post_id, owner_id, DeletionReason::NoticeConfirmed)
            .await
    }

    /// 启动时扫描存储，重新登记未过期帖子，清理停机期间已过期的帖子
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let mut posts = self.inner.store.scan_all().await?;
        let now = Utc::now();
        let mut report = RecoveryReport::default();

        while let Some((id, post)) = posts.try_next().await? {
            let (notice_at, delete_at) = self.inner.deadlines(&post);
            if delete_at > now {
                self.inner
                    .arm(id, post.owner_id().to_string(), notice_at, delete_at);
                report.rescheduled += 1;
                continue;
            }

            match self.inner.delete_locked(&id).await {
                Ok(removed) => {
                    if removed {
                        self.inner.emit(LifecycleEvent::PostDeleted {
                            post_id: id.clone(),
                            owner_id: post.owner_id().to_string(),
                            reason: DeletionReason::ExpiredWhileOffline,
                        });
                    }
                    report.expired += 1;
                }
                Err(e) => {
                    self.inner.metrics.record_store_error("lifecycle_recover");
                    warn!(post_id = %id, error = %e, "Failed to delete post expired while offline");
                    report.failed += 1;
                }
            }
        }

        info!(
            rescheduled = report.rescheduled,
            expired = report.expired,
            failed = report.failed,
            "Lifecycle timers recovered"
        );
        Ok(report)
    }

    /// 停止全部定时器（不删除帖子，重启后由 `recover` 接管）
    pub fn shutdown(&self) {
        let cancelled = self.inner.timers.len();
        self.inner.timers.clear();
        self.inner.sync_gauge();
        info!(cancelled, "Lifecycle scheduler stopped");
    }
}

/// 发帖名额占位
///
/// 丢弃时若名额仍未绑定到帖子则释放
pub struct OwnerReservation {
    slot: Option<(Arc<SchedulerInner>, String, String)>,
}

impl Drop for OwnerReservation {
    fn drop(&mut self) {
        if let Some((inner, owner_id, marker)) = self.slot.take()
            && inner
                .active_owners
                .remove_if(&owner_id, |_, held| *held == marker)
                .is_some()
        {
            debug!(owner_id = %owner_id, "Released unused posting slot");
        }
    }
}

impl SchedulerInner {
    fn deadlines(&self, post: &PostedMessage) -> (DateTime<Utc>, DateTime<Utc>) {
        let (default_notice, default_delete) = self.config.deadlines_from(post.created_at);
        (
            post.notice_at.unwrap_or(default_notice),
            post.scheduled_delete_at.unwrap_or(default_delete),
        )
    }

    fn arm(
        self: &Arc<Self>,
        post_id: String,
        owner_id: String,
        notice_at: DateTime<Utc>,
        delete_at: DateTime<Utc>,
    ) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let previous = self.timers.insert(
            post_id.clone(),
            TimerEntry {
                owner_id: owner_id.clone(),
                state: LifecycleState::Active,
                delete_at,
                generation,
                _cancel: cancel_tx,
            },
        );
        if previous.is_some() {
            debug!(post_id = %post_id, "Replaced existing lifecycle timer");
        }
        self.active_owners.insert(owner_id, post_id.clone());
        self.sync_gauge();

        let now = Utc::now();
        let notice_in = duration_until(notice_at, now);
        let delete_in = duration_until(delete_at, now).max(notice_in);
        let started = Instant::now();
        let notice_deadline = started + notice_in;
        let delete_deadline = started + delete_in;

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner
                .run_timer(post_id, generation, notice_deadline, delete_deadline, cancel_rx)
                .await;
        });
    }

    async fn run_timer(
        self: Arc<Self>,
        post_id: String,
        generation: u64,
        notice_deadline: Instant,
        delete_deadline: Instant,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        tokio::select! {
            _ = tokio::time::sleep_until(notice_deadline) => {}
            _ = &mut cancel_rx => {
                debug!(post_id = %post_id, "Lifecycle timer cancelled before notice");
                return;
            }
        }
        self.enter_notice(&post_id, generation);

        tokio::select! {
            _ = tokio::time::sleep_until(delete_deadline) => {}
            _ = &mut cancel_rx => {
                debug!(post_id = %post_id, "Lifecycle timer cancelled during notice");
                return;
            }
        }
        self.expire(&post_id, generation).await;
    }

    fn enter_notice(&self, post_id: &str, generation: u64) {
        let event = match self.timers.get_mut(post_id) {
            Some(mut entry)
                if entry.generation == generation && entry.state == LifecycleState::Active =>
            {
                entry.state = LifecycleState::NoticePending;
                LifecycleEvent::DeletionNotice {
                    post_id: post_id.to_string(),
                    owner_id: entry.owner_id.clone(),
                    delete_at: entry.delete_at,
                }
            }
            _ => return,
        };

        self.metrics.record_transition("active_to_notice_pending");
        info!(post_id = %post_id, owner_id = %event.owner_id(), "Deletion notice issued");
        self.emit(event);
    }

    async fn expire(&self, post_id: &str, generation: u64) {
        let Some((_, entry)) = self
            .timers
            .remove_if(post_id, |_, entry| entry.generation == generation)
        else {
            return;
        };
        self.sync_gauge();
        self.metrics.record_transition("notice_pending_to_deleted");

        let attempts = self.config.delete_retry_attempts.saturating_add(1);
        for attempt in 1..=attempts {
            match self.delete_locked(post_id).await {
                Ok(removed) => {
                    self.release_owner(&entry.owner_id, post_id);
                    if removed {
                        self.emit(LifecycleEvent::PostDeleted {
                            post_id: post_id.to_string(),
                            owner_id: entry.owner_id.clone(),
                            reason: DeletionReason::Expired,
                        });
                    }
                    info!(post_id = %post_id, removed, "Post expired");
                    return;
                }
                Err(e) => {
                    self.metrics.record_store_error("lifecycle_delete");
                    warn!(
                        post_id = %post_id,
                        attempt,
                        attempts,
                        error = %e,
                        "Scheduled deletion failed"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(DELETE_RETRY_BACKOFF).await;
                    }
                }
            }
        }

        self.release_owner(&entry.owner_id, post_id);
        error!(post_id = %post_id, "Scheduled deletion abandoned");
    }

    /// 与评分更新共用同一把按 ID 的锁
    async fn delete_locked(&self, post_id: &str) -> Result<bool> {
        let _guard = self.locks.acquire(post_id).await;
        match self.store.delete(post_id).await {
            Ok(removed) => Ok(removed),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn release_owner(&self, owner_id: &str, post_id: &str) {
        self.active_owners
            .remove_if(owner_id, |_, live_post| live_post == post_id);
    }

    fn emit(&self, event: LifecycleEvent) {
        let name = event.name();
        if self.events.send(event).is_err() {
            debug!(event = name, "No lifecycle subscribers");
        }
    }

    fn sync_gauge(&self) {
        self.metrics
            .lifecycle_live_timers
            .set(self.timers.len() as i64);
    }
}
