//! 配置管理器 - 负责处理不同环境下的配置选择和覆盖
//!
//! 该模块提供了配置管理功能，包括：
//! - 根据环境变量选择对象存储配置
//! - 加载环境特定配置
//! - 合并配置值

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use toml::Value;
use tracing::warn;

use super::{HypeAppConfig, ObjectStoreConfig};

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 根据环境变量或配置选择对象存储配置
    ///
    /// 优先级：
    /// 1. 环境变量 HYPEUP_OBJECT_STORE_PROFILE 指定的配置
    /// 2. 配置文件中指定的配置
    pub fn select_object_store_config(
        config: &HypeAppConfig,
        profile_name: Option<&str>,
    ) -> Option<ObjectStoreConfig> {
        if let Ok(env_profile) = env::var("HYPEUP_OBJECT_STORE_PROFILE") {
            if let Some(store_config) = config.object_store_profile(&env_profile) {
                return Some(store_config.clone());
            }
            warn!(profile = %env_profile, "object store profile from environment not found");
        }

        profile_name.and_then(|name| config.object_store_profile(name).cloned())
    }

    /// 获取当前环境名称
    ///
    /// 从环境变量 HYPEUP_ENV 获取，未设置时默认为 "development"
    pub fn get_environment() -> String {
        env::var("HYPEUP_ENV").unwrap_or_else(|_| "development".to_string())
    }

    /// 根据环境加载特定配置
    ///
    /// 加载 config/environments/{environment}.toml 中的对象存储配置并覆盖到基础配置中
    pub fn load_environment_config(base_config: &mut HypeAppConfig) -> Result<()> {
        let env = Self::get_environment();
        let env_config_path = format!("config/environments/{}.toml", env);
        Self::load_environment_file(base_config, Path::new(&env_config_path))
    }

    fn load_environment_file(base_config: &mut HypeAppConfig, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("无法读取环境配置文件: {}", path.display()))?;
        let env_config: Value = toml::from_str(&content)
            .with_context(|| format!("无效的环境配置格式: {}", path.display()))?;

        Self::merge_object_storage(&mut base_config.object_storage, &env_config);
        Ok(())
    }

    /// 将环境配置中的对象存储配置合并到基础配置中
    ///
    /// 只有包含 profile_type 的表才会被接受
    fn merge_object_storage(
        object_storage: &mut HashMap<String, ObjectStoreConfig>,
        env_config: &Value,
    ) {
        let Some(tables) = env_config.get("object_storage").and_then(Value::as_table) else {
            return;
        };

        for (key, value) in tables {
            if value.get("profile_type").and_then(Value::as_str).is_none() {
                continue;
            }
            match value.clone().try_into::<ObjectStoreConfig>() {
                Ok(config) => {
                    object_storage.insert(key.clone(), config);
                }
                Err(e) => {
                    warn!(profile = %key, error = %e, "invalid object storage override");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_file_overrides_object_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("production.toml");
        fs::write(
            &path,
            r#"
[object_storage.media]
profile_type = "local"
root_dir = "/var/lib/hypeup"

[object_storage.broken]
root_dir = "/tmp"
"#,
        )
        .unwrap();

        let mut cfg = HypeAppConfig::default();
        ConfigManager::load_environment_file(&mut cfg, &path).unwrap();

        let media = cfg.object_store_profile("media").unwrap();
        assert_eq!(media.profile_type, "local");
        assert_eq!(media.root_dir.as_deref(), Some("/var/lib/hypeup"));
        assert!(cfg.object_store_profile("broken").is_none());
    }

    #[test]
    fn test_missing_environment_file_is_ignored() {
        let mut cfg = HypeAppConfig::default();
        let result =
            ConfigManager::load_environment_file(&mut cfg, Path::new("/nonexistent/env.toml"));
        assert!(result.is_ok());
        assert!(cfg.object_storage.is_empty());
    }
}
