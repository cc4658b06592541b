//! # Prometheus 指标收集模块
//!
//! 为消息服务提供统一的 Prometheus 指标收集能力。

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// 全局指标注册表
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// 消息服务指标
#[derive(Clone)]
pub struct MessagingMetrics {
    /// 聊天消息发送总数（按消息类型）
    pub chat_messages_sent_total: IntCounterVec,
    /// 帖子创建总数（按发帖角色）
    pub posts_created_total: IntCounterVec,
    /// 评分操作总数（added / changed / removed）
    pub rating_actions_total: IntCounterVec,
    /// 生命周期状态迁移次数
    pub lifecycle_transitions_total: IntCounterVec,
    /// 当前存活的生命周期定时器数量
    pub lifecycle_live_timers: IntGauge,
    /// 存储错误次数（按操作）
    pub store_errors_total: IntCounterVec,
}

impl MessagingMetrics {
    /// 创建指标（未注册）
    pub fn new() -> prometheus::Result<Self> {
        let chat_messages_sent_total = IntCounterVec::new(
            Opts::new(
                "hypeup_chat_messages_sent_total",
                "Total number of chat messages accepted",
            ),
            &["kind"],
        )?;

        let posts_created_total = IntCounterVec::new(
            Opts::new("hypeup_posts_created_total", "Total number of posts created"),
            &["role"],
        )?;

        let rating_actions_total = IntCounterVec::new(
            Opts::new(
                "hypeup_rating_actions_total",
                "Total number of rating mutations by outcome",
            ),
            &["outcome"],
        )?;

        let lifecycle_transitions_total = IntCounterVec::new(
            Opts::new(
                "hypeup_lifecycle_transitions_total",
                "Post lifecycle transitions by edge",
            ),
            &["transition"],
        )?;

        let lifecycle_live_timers = IntGauge::new(
            "hypeup_lifecycle_live_timers",
            "Number of posts with a live expiry timer",
        )?;

        let store_errors_total = IntCounterVec::new(
            Opts::new(
                "hypeup_store_errors_total",
                "Message store failures by operation",
            ),
            &["operation"],
        )?;

        Ok(Self {
            chat_messages_sent_total,
            posts_created_total,
            rating_actions_total,
            lifecycle_transitions_total,
            lifecycle_live_timers,
            store_errors_total,
        })
    }

    /// 注册到指定注册表
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.chat_messages_sent_total.clone()))?;
        registry.register(Box::new(self.posts_created_total.clone()))?;
        registry.register(Box::new(self.rating_actions_total.clone()))?;
        registry.register(Box::new(self.lifecycle_transitions_total.clone()))?;
        registry.register(Box::new(self.lifecycle_live_timers.clone()))?;
        registry.register(Box::new(self.store_errors_total.clone()))?;
        Ok(())
    }

    pub fn record_chat_sent(&self, kind: &str) {
        self.chat_messages_sent_total.with_label_values(&[kind]).inc();
    }

    pub fn record_post_created(&self, role: &str) {
        self.posts_created_total.with_label_values(&[role]).inc();
    }

    pub fn record_rating(&self, outcome: &str) {
        self.rating_actions_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_transition(&self, transition: &str) {
        self.lifecycle_transitions_total
            .with_label_values(&[transition])
            .inc();
    }

    pub fn record_store_error(&self, operation: &str) {
        self.store_errors_total.with_label_values(&[operation]).inc();
    }
}

/// 以 Prometheus 文本格式导出注册表
pub fn gather_text(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
