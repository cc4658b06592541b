//! HypeUp Core 配置模块
//!
//! 该模块提供了完整的应用程序配置管理功能，包括：
//! - 配置文件加载和解析（单文件或目录分片合并）
//! - 环境特定配置覆盖
//! - 消息服务、Redis、MongoDB、对象存储等配置定义

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use toml::Value;
use tracing::warn;

// 导入配置管理器模块
mod manager;
pub use manager::ConfigManager;

/// 全局应用配置实例，使用 OnceLock 确保只初始化一次
static APP_CONFIG: OnceLock<HypeAppConfig> = OnceLock::new();

/// 服务监听配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_address")]
    pub address: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 优先）
    pub level: String,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_file: bool,
    pub with_line_number: bool,
    /// 是否输出 JSON 格式
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
            json: false,
        }
    }
}

/// Redis 连接池配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RedisPoolConfig {
    /// Redis 服务器地址
    pub url: String,
    /// 命名空间前缀
    #[serde(default)]
    pub namespace: Option<String>,
    /// 数据库编号
    #[serde(default)]
    pub database: Option<u32>,
}

/// MongoDB 实例配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MongoInstanceConfig {
    /// MongoDB 连接 URL
    pub url: String,
    /// 数据库名称
    #[serde(default)]
    pub database: Option<String>,
}

/// 对象存储配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ObjectStoreConfig {
    /// 存储类型（目前支持 local）
    pub profile_type: String,
    /// 本地存储根目录
    #[serde(default)]
    pub root_dir: Option<String>,
    /// 对外访问的基础 URL
    #[serde(default)]
    pub base_url: Option<String>,
}

/// 服务端点配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceEndpointConfig {
    /// 服务地址
    pub address: Option<String>,
    /// 服务端口
    pub port: Option<u16>,
}

/// 服务运行时配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceRuntimeConfig {
    /// 服务名称
    #[serde(default)]
    pub service_name: Option<String>,
    /// 服务器配置
    #[serde(default)]
    pub server: Option<ServiceEndpointConfig>,
}

/// 消息服务配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MessagingServiceConfig {
    /// 运行时配置
    #[serde(flatten)]
    pub runtime: ServiceRuntimeConfig,
    /// 消息存储（"memory" 或 Redis 配置名）
    #[serde(default)]
    pub message_store: Option<String>,
    /// 身份目录（"memory" 或 MongoDB 配置名）
    #[serde(default)]
    pub identity_store: Option<String>,
    /// 对象存储配置名
    #[serde(default)]
    pub object_store: Option<String>,
    /// 存储键前缀
    #[serde(default)]
    pub key_prefix: Option<String>,
    /// 发帖后多久发出删除提醒（秒）
    #[serde(default)]
    pub notice_offset_seconds: Option<u64>,
    /// 帖子总存活时间（秒）
    #[serde(default)]
    pub total_lifetime_seconds: Option<u64>,
    /// 定时删除失败后的重试次数
    #[serde(default)]
    pub delete_retry_attempts: Option<u32>,
    /// 是否启用发帖冷却
    #[serde(default)]
    pub enforce_posting_cooldown: Option<bool>,
    /// 删除提醒广播通道容量
    #[serde(default)]
    pub notice_channel_capacity: Option<usize>,
    /// 允许跨域的来源
    #[serde(default)]
    pub cors_allowed_origin: Option<String>,
}

/// 服务配置集合
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServicesConfig {
    /// 消息服务配置
    #[serde(default)]
    pub messaging: Option<MessagingServiceConfig>,
}

/// HypeUp 应用配置主结构体
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HypeAppConfig {
    /// 默认监听配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Redis 配置映射
    #[serde(default)]
    pub redis: HashMap<String, RedisPoolConfig>,
    /// MongoDB 配置映射
    #[serde(default)]
    pub mongodb: HashMap<String, MongoInstanceConfig>,
    /// 对象存储配置映射
    #[serde(default)]
    pub object_storage: HashMap<String, ObjectStoreConfig>,
    /// 服务配置
    #[serde(default)]
    pub services: ServicesConfig,
}

impl HypeAppConfig {
    /// 获取 Redis 配置
    pub fn redis_profile(&self, name: &str) -> Option<&RedisPoolConfig> {
        self.redis.get(name)
    }

    /// 获取 MongoDB 配置
    pub fn mongodb_profile(&self, name: &str) -> Option<&MongoInstanceConfig> {
        self.mongodb.get(name)
    }

    /// 获取对象存储配置
    pub fn object_store_profile(&self, name: &str) -> Option<&ObjectStoreConfig> {
        self.object_storage.get(name)
    }

    /// 获取消息服务配置
    pub fn messaging_service(&self) -> MessagingServiceConfig {
        self.services.messaging.clone().unwrap_or_default()
    }

    /// 解析服务监听地址（服务级配置优先于全局配置）
    pub fn server_addr(&self, runtime: &ServiceRuntimeConfig) -> Result<SocketAddr> {
        let mut address = self.server.address.clone();
        let mut port = self.server.port;

        if let Some(server) = runtime.server.as_ref() {
            if let Some(addr) = server.address.as_ref().filter(|a| !a.is_empty()) {
                address = addr.clone();
            }
            if let Some(p) = server.port {
                port = p;
            }
        }

        format!("{}:{}", address, port)
            .parse()
            .with_context(|| format!("invalid server address: {}:{}", address, port))
    }

    /// 校验服务配置中引用的存储配置是否存在
    pub fn validate_references(&self) -> Result<()> {
        let messaging = self.messaging_service();

        if let Some(store) = messaging.message_store.as_deref() {
            if store != "memory" && self.redis_profile(store).is_none() {
                return Err(anyhow!("message_store references unknown redis profile '{}'", store));
            }
        }

        if let Some(store) = messaging.identity_store.as_deref() {
            if store != "memory" && self.mongodb_profile(store).is_none() {
                return Err(anyhow!(
                    "identity_store references unknown mongodb profile '{}'",
                    store
                ));
            }
        }

        if let Some(profile) = messaging.object_store.as_deref() {
            if self.object_store_profile(profile).is_none() {
                return Err(anyhow!(
                    "object_store references unknown object storage profile '{}'",
                    profile
                ));
            }
        }

        Ok(())
    }
}

/// 加载配置
pub fn load_config(path: Option<&str>) -> &'static HypeAppConfig {
    let candidates: Vec<PathBuf> = match path {
        Some(p) => vec![PathBuf::from(p)],
        None => vec![PathBuf::from("config"), PathBuf::from("config.toml")],
    };

    APP_CONFIG.get_or_init(|| {
        let mut cfg = load_with_fallback(&candidates);
        // 加载环境特定配置
        if let Err(e) = manager::ConfigManager::load_environment_config(&mut cfg) {
            warn!("failed to load environment config: {}", e);
        }
        cfg
    })
}

/// 使用备选方案加载配置
fn load_with_fallback(candidates: &[PathBuf]) -> HypeAppConfig {
    for path in candidates {
        match load_config_from_source(path) {
            Ok(cfg) => return cfg,
            Err(err) => {
                warn!("failed to load config from {}: {err}", path.display());
            }
        }
    }

    warn!("no configuration source succeeded, falling back to defaults");
    HypeAppConfig::default()
}

/// 从源加载配置
pub fn load_config_from_source(path: &Path) -> Result<HypeAppConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "configuration path {} does not exist",
            path.display()
        ));
    }

    let metadata = path
        .metadata()
        .with_context(|| format!("unable to read metadata for {}", path.display()))?;

    if metadata.is_dir() {
        load_config_from_directory(path)
    } else {
        load_config_from_file(path)
    }
}

/// 从文件加载配置
fn load_config_from_file(path: &Path) -> Result<HypeAppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file: {}", path.display()))?;
    let cfg: HypeAppConfig = toml::from_str(&content)
        .with_context(|| format!("invalid config format: {}", path.display()))?;
    Ok(cfg)
}

/// 从目录加载配置
fn load_config_from_directory(path: &Path) -> Result<HypeAppConfig> {
    let base_file = path.join("base.toml");
    if !base_file.exists() {
        return Err(anyhow!(
            "missing base configuration: {}",
            base_file.display()
        ));
    }

    let mut merged = load_toml_value(&base_file)?;

    if !merged.is_table() {
        return Err(anyhow!(
            "base configuration must be a table: {}",
            base_file.display()
        ));
    }

    merge_directory(&mut merged, &path.join("shared"))?;
    merge_directory(&mut merged, &path.join("services"))?;
    merge_directory(&mut merged, &path.join("overrides"))?;

    let cfg: HypeAppConfig = merged
        .try_into()
        .with_context(|| format!("invalid configuration after merging {}", path.display()))?;

    Ok(cfg)
}

/// 合并目录中的配置
fn merge_directory(root: &mut Value, dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("unable to read config directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(OsStr::to_str)
                .map(|ext| ext.eq_ignore_ascii_case("toml"))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let value = load_toml_value(&entry.path())?;
        merge_value(root, value);
    }

    Ok(())
}

/// 加载 TOML 值
fn load_toml_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config fragment {}", path.display()))?;
    let value: Value = toml::from_str(&content)
        .with_context(|| format!("invalid TOML content in fragment {}", path.display()))?;
    Ok(value)
}

/// 合并值（表递归合并，其它类型整体覆盖）
fn merge_value(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Table(overlay_table) => {
            if let Value::Table(base_table) = base {
                for (key, overlay_value) in overlay_table.into_iter() {
                    match base_table.get_mut(&key) {
                        Some(base_value) => merge_value(base_value, overlay_value),
                        None => {
                            base_table.insert(key, overlay_value);
                        }
                    }
                }
            } else {
                *base = Value::Table(overlay_table);
            }
        }
        other => {
            *base = other;
        }
    }
}
