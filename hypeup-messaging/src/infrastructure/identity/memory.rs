use async_trait::async_trait;
use dashmap::DashMap;
use hypeup_core::Result;

use crate::domain::model::{Role, SenderProfile};
use crate::domain::repository::IdentityResolver;

/// 进程内身份目录（开发与测试使用）
#[derive(Default)]
pub struct InMemoryIdentityDirectory {
    profiles: DashMap<(Role, String), SenderProfile>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, role: Role, id: impl Into<String>, name: impl Into<String>) {
        let id = id.into();
        let profile = SenderProfile {
            id: id.clone(),
            name: name.into(),
            role,
        };
        self.profiles.insert((role, id), profile);
    }

    pub fn with_profile(self, role: Role, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.register(role, id, name);
        self
    }
}

#[async_trait]
impl IdentityResolver for InMemoryIdentityDirectory {
    async fn resolve(&self, role: Role, id: &str) -> Result<Option<SenderProfile>> {
        Ok(self
            .profiles
            .get(&(role, id.to_string()))
            .map(|entry| entry.value().clone()))
    }
}
