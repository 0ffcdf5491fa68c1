use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;
pub mod tokens;

pub use repositories::group::Group;
pub use repositories::host_key::HostKey;
pub use repositories::host_log::HostLogRow;
pub use repositories::inventory::Inventory;
pub use repositories::session::Session;
pub use repositories::user::{NewUser, User, UserChanges, generate_token, hash_password};
pub use tokens::TokenStore;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    /// Private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::with_pool_options("sqlite::memory:", 1, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");
        // Each pooled connection would otherwise open its own empty database.
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };
        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);
        if !in_memory {
            opt.idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn session_repo(&self) -> repositories::session::SessionRepository {
        repositories::session::SessionRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn host_key_repo(&self) -> repositories::host_key::HostKeyRepository {
        repositories::host_key::HostKeyRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn host_repo(&self) -> repositories::host::HostRepository {
        repositories::host::HostRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn group_repo(&self) -> repositories::group::GroupRepository {
        repositories::group::GroupRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn inventory_repo(&self) -> repositories::inventory::InventoryRepository {
        repositories::inventory::InventoryRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn host_log_repo(&self) -> repositories::host_log::HostLogRepository {
        repositories::host_log::HostLogRepository::new(self.conn.clone())
    }

    // ========== User Repository Methods ==========

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<Option<User>> {
        self.user_repo().verify_password(username, password).await
    }

    pub async fn create_user(
        &self,
        new_user: NewUser,
        config: &crate::config::SecurityConfig,
    ) -> Result<User> {
        self.user_repo().create(new_user, config).await
    }

    // ========== Session Repository Methods ==========

    pub async fn create_session(&self, user_id: i32, timeout: DateTime<Utc>) -> Result<Session> {
        self.session_repo().create(user_id, timeout).await
    }

    pub async fn delete_session(&self, token: &str) -> Result<bool> {
        self.session_repo().delete(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_migrates_and_pings() {
        let store = Store::in_memory().await.unwrap();
        store.ping().await.unwrap();
        assert_eq!(store.user_repo().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn session_extension_never_shortens_or_revives() {
        let store = Store::in_memory().await.unwrap();
        let user = store
            .create_user(
                NewUser {
                    username: "alice".to_string(),
                    password: None,
                    email: String::new(),
                    role: crate::domain::Role::User,
                    inventories: vec!["default".to_string()],
                    auth_source: "local",
                },
                &crate::config::SecurityConfig::default(),
            )
            .await
            .unwrap();

        let now = Utc::now();
        let session = store
            .create_session(user.id, now + chrono::Duration::minutes(30))
            .await
            .unwrap();
        let repo = store.session_repo();

        // A shorter timeout is not applied.
        let effective = repo
            .extend(&session.token, now, now + chrono::Duration::minutes(20))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(effective, session.timeout);

        // An expired session is not revived.
        let expired = store
            .create_session(user.id, now - chrono::Duration::minutes(1))
            .await
            .unwrap();
        let revived = repo
            .extend(&expired.token, now, now + chrono::Duration::minutes(20))
            .await
            .unwrap();
        assert!(revived.is_none());
        assert!(repo.delete_if_expired(&expired.token, now).await.unwrap());
        assert!(!repo.delete_if_expired(&session.token, now).await.unwrap());
    }

    #[tokio::test]
    async fn log_rows_are_selected_oldest_first() {
        let store = Store::in_memory().await.unwrap();
        let repo = store.host_log_repo();
        let base = Utc::now();
        for offset in [3_i64, 1, 2] {
            repo.insert(HostLogRow {
                host_name: "web1".to_string(),
                level: "info".to_string(),
                component: "agent".to_string(),
                message: format!("m{offset}"),
                timestamp: base + chrono::Duration::seconds(offset),
                metadata: None,
                log_type: "monokit".to_string(),
            })
            .await
            .unwrap();
        }

        let ids = repo.oldest_ids(2).await.unwrap();
        assert_eq!(ids, vec![2, 3]);
    }
}
