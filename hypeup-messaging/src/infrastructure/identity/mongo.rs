use async_trait::async_trait;
use hypeup_core::{Result, StoreResultExt};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{ClientOptions, FindOneOptions};
use mongodb::{Client, Collection};

use crate::domain::model::{Role, SenderProfile};
use crate::domain::repository::IdentityResolver;

const DEFAULT_DATABASE: &str = "hypeup";

/// 基于 MongoDB 的身份目录
///
/// 用户在 `users` 集合，推广者在 `promoters` 集合，按 `_id` 查找 `name`
pub struct MongoIdentityResolver {
    users: Collection<Document>,
    promoters: Collection<Document>,
}

impl MongoIdentityResolver {
    pub async fn connect(url: &str, database: Option<&str>) -> Result<Self> {
        let options = ClientOptions::parse(url).await.store_context("connect")?;
        let client = Client::with_options(options).store_context("connect")?;
        let db = client.database(database.unwrap_or(DEFAULT_DATABASE));

        Ok(Self {
            users: db.collection::<Document>("users"),
            promoters: db.collection::<Document>("promoters"),
        })
    }

    fn collection(&self, role: Role) -> &Collection<Document> {
        match role {
            Role::User => &self.users,
            Role::Promoter => &self.promoters,
        }
    }
}

/// 兼容 ObjectId 与字符串两种主键
fn id_filter(id: &str) -> Document {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! {"_id": oid},
        Err(_) => doc! {"_id": id},
    }
}

#[async_trait]
impl IdentityResolver for MongoIdentityResolver {
    async fn resolve(&self, role: Role, id: &str) -> Result<Option<SenderProfile>> {
        let options = FindOneOptions::builder()
            .projection(doc! {"name": 1})
            .build();
        let found = self
            .collection(role)
            .find_one(id_filter(id), options)
            .await
            .store_context("resolve_identity")?;

        Ok(found.map(|document| SenderProfile {
            id: id.to_string(),
            name: match document.get("name") {
                Some(Bson::String(name)) => name.clone(),
                _ => String::new(),
            },
            role,
        }))
    }
}
