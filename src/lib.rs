//! HypeUp Core 公共库
//!
//! 提供统一的配置加载、错误分类、日志初始化与指标收集能力

pub mod config;
pub mod error;
pub mod metrics;
pub mod tracing;
pub mod utils;

pub use config::{
    ConfigManager, HypeAppConfig, LoggingConfig, MessagingServiceConfig, MongoInstanceConfig,
    ObjectStoreConfig, RedisPoolConfig, ServerConfig, load_config,
};
pub use error::*;
pub use utils::*;
