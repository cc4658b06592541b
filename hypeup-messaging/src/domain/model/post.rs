use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hypeup_core::{HypeError, Result};
use serde::{Deserialize, Serialize};

use super::Role;

/// 星级档位数
pub const STAR_LEVELS: usize = 5;

/// 合法星级（1..=5）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Star(u8);

impl Star {
    pub fn new(value: i64) -> Result<Self> {
        if (1..=STAR_LEVELS as i64).contains(&value) {
            Ok(Star(value as u8))
        } else {
            Err(HypeError::invalid_argument(
                "Invalid star rating. Must be between 1 and 5.",
            ))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// 星级直方图：下标 i 为 (i+1) 星的人数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingCounts(pub [u32; STAR_LEVELS]);

impl RatingCounts {
    /// 由评分表重新计算，越界值（如遗留的 0）不计入
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a u8>) -> Self {
        let mut counts = [0u32; STAR_LEVELS];
        for &value in values {
            if (1..=STAR_LEVELS as u8).contains(&value) {
                counts[usize::from(value) - 1] += 1;
            }
        }
        RatingCounts(counts)
    }

    /// 有效评分人数
    pub fn raters(&self) -> u32 {
        self.0.iter().sum()
    }
}

/// 一次评分切换的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingOutcome {
    Added,
    Changed { previous: u8 },
    Removed,
}

impl RatingOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingOutcome::Added => "added",
            RatingOutcome::Changed { .. } => "changed",
            RatingOutcome::Removed => "removed",
        }
    }
}

/// 帖子（hype post）记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostedMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub cost: u64,
    /// 发帖人 ID（帖子的所有者）
    pub receiver_id: String,
    pub sender_name: String,
    #[serde(rename = "userType", alias = "role")]
    pub role: Role,
    pub release_date: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub ratings: BTreeMap<String, u8>,
    #[serde(default)]
    pub rating_counts: RatingCounts,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_delete_at: Option<DateTime<Utc>>,
}

impl PostedMessage {
    pub fn owner_id(&self) -> &str {
        &self.receiver_id
    }

    /// 切换评分者的星级：相同星级撤销，不同星级覆盖，否则新增
    ///
    /// 切换后同步重算直方图
    pub fn toggle_rating(&mut self, rater_id: &str, star: Star) -> RatingOutcome {
        let existing = self.ratings.get(rater_id).copied().filter(|v| *v != 0);
        let outcome = match existing {
            Some(previous) if previous == star.value() => {
                self.ratings.remove(rater_id);
                RatingOutcome::Removed
            }
            Some(previous) => {
                self.ratings.insert(rater_id.to_string(), star.value());
                RatingOutcome::Changed { previous }
            }
            None => {
                self.ratings.insert(rater_id.to_string(), star.value());
                RatingOutcome::Added
            }
        };
        self.recompute_counts();
        outcome
    }

    pub fn recompute_counts(&mut self) {
        self.rating_counts = RatingCounts::from_values(self.ratings.values());
    }
}

/// 帖子的只读投影
///
/// `ratings` 为原始评分表，`filtered_ratings` 去掉了非正值，
/// `total_ratings` 为有效星级之和，`rating_counts` 由原始表重算
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostProjection {
    pub id: String,
    pub content: String,
    pub cost: u64,
    pub receiver_id: String,
    pub sender_name: String,
    #[serde(rename = "userType")]
    pub role: Role,
    pub release_date: DateTime<Utc>,
    pub images: Vec<String>,
    pub ratings: BTreeMap<String, u8>,
    pub filtered_ratings: BTreeMap<String, u8>,
    pub total_ratings: u64,
    pub rating_counts: RatingCounts,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_delete_at: Option<DateTime<Utc>>,
}

impl From<PostedMessage> for PostProjection {
    fn from(post: PostedMessage) -> Self {
        let filtered_ratings: BTreeMap<String, u8> = post
            .ratings
            .iter()
            .filter(|(_, v)| **v > 0)
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        let total_ratings = filtered_ratings.values().map(|v| u64::from(*v)).sum();
        let rating_counts = RatingCounts::from_values(post.ratings.values());

        PostProjection {
            id: post.id,
            content: post.content,
            cost: post.cost,
            receiver_id: post.receiver_id,
            sender_name: post.sender_name,
            role: post.role,
            release_date: post.release_date,
            images: post.images,
            ratings: post.ratings,
            filtered_ratings,
            total_ratings,
            rating_counts,
            created_at: post.created_at,
            notice_at: post.notice_at,
            scheduled_delete_at: post.scheduled_delete_at,
        }
    }
}

/// 上传的帖子图片
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// 待创建的帖子（未校验的原始输入）
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub content: String,
    pub cost: u64,
    pub receiver_id: String,
    pub role: Option<String>,
    pub release_date: Option<String>,
    pub images: Vec<String>,
    pub media: Option<MediaUpload>,
}

/// 议价金额步长
pub const COST_STEP: u64 = 10;

/// 编辑回复时的议价金额步进器，最低为 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DraftCost(u64);

impl DraftCost {
    pub fn new(value: u64) -> Self {
        DraftCost(value)
    }

    pub fn increment(&mut self) -> u64 {
        self.0 = self.0.saturating_add(COST_STEP);
        self.0
    }

    pub fn decrement(&mut self) -> u64 {
        self.0 = self.0.saturating_sub(COST_STEP);
        self.0
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}
