//! HypeUp Core 错误工具模块
//!
//! - 统一对外暴露消息核心的错误分类
//! - 为基础设施层提供便捷的错误转换工具

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// 错误码（与错误分类一一对应，可直接序列化给调用方）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// 请求参数缺失或不一致
    InvalidArgument,
    /// 目标消息不存在
    NotFound,
    /// 后端存储 I/O 失败（可重试）
    StoreUnavailable,
    /// 调用方无权执行该操作
    Unauthorized,
    /// 状态冲突（发帖冷却期、ID 冲突）
    Conflict,
    /// 内部错误
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::StoreUnavailable => "STORE_UNAVAILABLE",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 消息核心错误类型
#[derive(Debug, Error)]
pub enum HypeError {
    /// 无效的参数
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// 消息未找到
    #[error("not found: {0}")]
    NotFound(String),

    /// 存储不可用
    #[error("store unavailable during {operation}: {source}")]
    StoreUnavailable {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 未授权
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 状态冲突
    #[error("conflict: {0}")]
    Conflict(String),

    /// 内部错误
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HypeError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        HypeError::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HypeError::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        HypeError::Unauthorized(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        HypeError::Conflict(message.into())
    }

    /// 将底层存储错误包装为 `StoreUnavailable`
    pub fn store<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        HypeError::StoreUnavailable {
            operation,
            source: source.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            HypeError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            HypeError::NotFound(_) => ErrorCode::NotFound,
            HypeError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            HypeError::Unauthorized(_) => ErrorCode::Unauthorized,
            HypeError::Conflict(_) => ErrorCode::Conflict,
            HypeError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// 只有存储不可用属于可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, HypeError::StoreUnavailable { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HypeError::NotFound(_))
    }
}

/// 消息核心结果类型
pub type Result<T, E = HypeError> = std::result::Result<T, E>;

/// 基础设施结果扩展：将任意底层错误转换为 `StoreUnavailable`
pub trait StoreResultExt<T> {
    fn store_context(self, operation: &'static str) -> Result<T>;
}

impl<T, E> StoreResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn store_context(self, operation: &'static str) -> Result<T> {
        self.map_err(|err| HypeError::store(operation, err))
    }
}

/// 便捷宏：条件不满足时直接返回 `InvalidArgument`
#[macro_export]
macro_rules! ensure_arg {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::HypeError::InvalidArgument(format!($($arg)+)));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_positive(value: i64) -> Result<i64> {
        ensure_arg!(value > 0, "value must be positive, got {}", value);
        Ok(value)
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            HypeError::invalid_argument("x").code(),
            ErrorCode::InvalidArgument
        );
        assert_eq!(HypeError::not_found("m1").code(), ErrorCode::NotFound);
        assert_eq!(HypeError::conflict("c").code(), ErrorCode::Conflict);
        assert_eq!(
            HypeError::from(anyhow::anyhow!("boom")).code(),
            ErrorCode::Internal
        );
    }

    #[test]
    fn test_only_store_errors_are_retryable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: Result<()> = Err(io).store_context("get");
        let err = err.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
        assert!(err.to_string().contains("get"));

        assert!(!HypeError::not_found("m1").is_retryable());
    }

    #[test]
    fn test_ensure_arg_macro() {
        assert_eq!(check_positive(3).unwrap(), 3);
        let err = check_positive(-1).unwrap_err();
        assert!(matches!(err, HypeError::InvalidArgument(ref msg) if msg.contains("-1")));
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::StoreUnavailable).unwrap();
        assert_eq!(json, "\"STORE_UNAVAILABLE\"");
        assert_eq!(ErrorCode::NotFound.to_string(), "NOT_FOUND");
    }
}
