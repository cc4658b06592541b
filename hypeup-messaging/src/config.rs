use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Result, anyhow};
use hypeup_core::config::{ConfigManager, HypeAppConfig};

use crate::domain::service::LifecycleConfig;

/// 消息存储后端
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageStoreBackend {
    Memory,
    /// `database` 覆盖 URL 中的库编号
    Redis { url: String, database: Option<u32> },
}

/// 身份目录后端
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityBackend {
    Memory,
    Mongo { url: String, database: Option<String> },
}

/// 本地图片存储
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobStoreSettings {
    pub root_dir: String,
    pub base_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct MessagingConfig {
    pub service_name: String,
    pub listen_addr: SocketAddr,
    pub message_store: MessageStoreBackend,
    pub identity_store: IdentityBackend,
    pub blob_store: Option<BlobStoreSettings>,
    pub key_prefix: String,
    pub lifecycle: LifecycleConfig,
    pub cors_allowed_origin: Option<String>,
}

impl MessagingConfig {
    /// 从应用配置加载（环境变量优先）
    pub fn from_app_config(app: &HypeAppConfig) -> Result<Self> {
        let service_config = app.messaging_service();

        let service_name = service_config
            .runtime
            .service_name
            .clone()
            .unwrap_or_else(|| "hypeup-messaging".to_string());
        let listen_addr = app.server_addr(&service_config.runtime)?;

        let message_store = match env::var("MESSAGING_REDIS_URL").ok().filter(|v| !v.is_empty()) {
            Some(url) => MessageStoreBackend::Redis {
                url,
                database: None,
            },
            None => match service_config.message_store.as_deref() {
                None | Some("memory") => MessageStoreBackend::Memory,
                Some(name) => {
                    let profile = app
                        .redis_profile(name)
                        .ok_or_else(|| anyhow!("unknown redis profile '{}'", name))?;
                    MessageStoreBackend::Redis {
                        url: profile.url.clone(),
                        database: profile.database,
                    }
                }
            },
        };

        let identity_store = match env::var("MESSAGING_MONGO_URL").ok().filter(|v| !v.is_empty()) {
            Some(url) => IdentityBackend::Mongo {
                url,
                database: env::var("MESSAGING_MONGO_DATABASE").ok(),
            },
            None => match service_config.identity_store.as_deref() {
                None | Some("memory") => IdentityBackend::Memory,
                Some(name) => {
                    let profile = app
                        .mongodb_profile(name)
                        .ok_or_else(|| anyhow!("unknown mongodb profile '{}'", name))?;
                    IdentityBackend::Mongo {
                        url: profile.url.clone(),
                        database: profile.database.clone(),
                    }
                }
            },
        };

        let blob_store =
            ConfigManager::select_object_store_config(app, service_config.object_store.as_deref())
                .map(|profile| {
                    if profile.profile_type != "local" {
                        return Err(anyhow!(
                            "unsupported object storage type '{}'",
                            profile.profile_type
                        ));
                    }
                    Ok(BlobStoreSettings {
                        root_dir: profile
                            .root_dir
                            .clone()
                            .unwrap_or_else(|| "./data/blobs".to_string()),
                        base_url: profile.base_url.clone(),
                    })
                })
                .transpose()?;

        let key_prefix = env::var("MESSAGING_KEY_PREFIX")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| {
                service_config.key_prefix.clone().or_else(|| {
                    service_config
                        .message_store
                        .as_deref()
                        .and_then(|name| app.redis_profile(name))
                        .and_then(|profile| profile.namespace.clone())
                })
            })
            .unwrap_or_else(|| "hypeup".to_string());

        let notice_offset_seconds = env::var("MESSAGING_NOTICE_OFFSET_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .or(service_config.notice_offset_seconds)
            .unwrap_or(55 * 60);

        let total_lifetime_seconds = env::var("MESSAGING_TOTAL_LIFETIME_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .or(service_config.total_lifetime_seconds)
            .unwrap_or(60 * 60);

        let enforce_posting_cooldown = env::var("MESSAGING_ENFORCE_POSTING_COOLDOWN")
            .ok()
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .or(service_config.enforce_posting_cooldown)
            .unwrap_or(true);

        let lifecycle = LifecycleConfig {
            notice_offset: Duration::from_secs(notice_offset_seconds),
            total_lifetime: Duration::from_secs(total_lifetime_seconds),
            delete_retry_attempts: service_config.delete_retry_attempts.unwrap_or(1),
            enforce_posting_cooldown,
            event_capacity: service_config.notice_channel_capacity.unwrap_or(256),
        };
        lifecycle.validate()?;

        Ok(Self {
            service_name,
            listen_addr,
            message_store,
            identity_store,
            blob_store,
            key_prefix,
            lifecycle,
            cors_allowed_origin: service_config.cors_allowed_origin.clone(),
        })
    }
}
