//! 工具函数模块
//!
//! 提供消息 ID 生成与时间计算等通用工具函数

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use ulid::{Generator, Ulid};

static ID_GENERATOR: Lazy<Mutex<Generator>> = Lazy::new(|| Mutex::new(Generator::new()));

/// 生成新的消息 ID
///
/// 使用单调 ULID：同一毫秒内也严格递增，扫描时可保持插入顺序
pub fn new_message_id() -> String {
    let generated = ID_GENERATOR
        .lock()
        .ok()
        .and_then(|mut generator| generator.generate().ok());
    generated.unwrap_or_else(Ulid::new).to_string()
}

/// 获取当前时间戳（毫秒）
pub fn current_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 计算从 `now` 到 `deadline` 的剩余时长，已过期时返回 0
pub fn duration_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}
