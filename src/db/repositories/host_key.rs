use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use super::user::generate_token;
use crate::entities::host_keys;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKey {
    pub token: String,
    pub host_name: String,
}

impl From<host_keys::Model> for HostKey {
    fn from(model: host_keys::Model) -> Self {
        Self {
            token: model.token,
            host_name: model.host_name,
        }
    }
}

pub struct HostKeyRepository {
    conn: DatabaseConnection,
}

impl HostKeyRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Mints the one and only key for `host_name`. Fails if one exists.
    pub async fn mint(&self, host_name: &str) -> Result<HostKey> {
        let active = host_keys::ActiveModel {
            token: Set(generate_token()),
            host_name: Set(host_name.to_string()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .with_context(|| format!("Failed to mint host key for {host_name}"))?;

        Ok(HostKey::from(model))
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<HostKey>> {
        let key = host_keys::Entity::find()
            .filter(host_keys::Column::Token.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to query host key")?;

        Ok(key.map(HostKey::from))
    }

    pub async fn find_by_host(&self, host_name: &str) -> Result<Option<HostKey>> {
        let key = host_keys::Entity::find()
            .filter(host_keys::Column::HostName.eq(host_name))
            .one(&self.conn)
            .await
            .context("Failed to query host key by host")?;

        Ok(key.map(HostKey::from))
    }
}
