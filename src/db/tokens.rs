//! Persistence contract consumed by the principal resolver.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{HostKey, NewUser, Session, Store, User};
use crate::config::SecurityConfig;
use crate::domain::Role;

/// Durable records of sessions and host keys, plus the user lookups needed
/// to turn a session into a principal.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn find_host_key(&self, token: &str) -> Result<Option<HostKey>>;

    /// First session matching any candidate, in candidate order.
    async fn find_session(&self, candidates: &[&str]) -> Result<Option<Session>>;

    /// Conditional sliding extension. `None` when the session is gone or
    /// already expired at `now`.
    async fn extend_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
        new_timeout: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Removes the session only while it is still expired at `now`.
    async fn delete_expired_session(&self, token: &str, now: DateTime<Utc>) -> Result<bool>;

    async fn get_user(&self, user_id: i32) -> Result<Option<User>>;

    async fn find_user(&self, username: &str) -> Result<Option<User>>;

    /// Creates a password-less `external` user.
    async fn provision_external_user(
        &self,
        username: &str,
        role: Role,
        inventory: &str,
    ) -> Result<User>;
}

#[async_trait]
impl TokenStore for Store {
    async fn find_host_key(&self, token: &str) -> Result<Option<HostKey>> {
        self.host_key_repo().find_by_token(token).await
    }

    async fn find_session(&self, candidates: &[&str]) -> Result<Option<Session>> {
        self.session_repo().find_by_tokens(candidates).await
    }

    async fn extend_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
        new_timeout: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        self.session_repo().extend(token, now, new_timeout).await
    }

    async fn delete_expired_session(&self, token: &str, now: DateTime<Utc>) -> Result<bool> {
        self.session_repo().delete_if_expired(token, now).await
    }

    async fn get_user(&self, user_id: i32) -> Result<Option<User>> {
        self.get_user_by_id(user_id).await
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        self.get_user_by_username(username).await
    }

    async fn provision_external_user(
        &self,
        username: &str,
        role: Role,
        inventory: &str,
    ) -> Result<User> {
        self.inventory_repo().ensure(inventory).await?;
        self.create_user(
            NewUser {
                username: username.to_string(),
                password: None,
                email: String::new(),
                role,
                inventories: vec![inventory.to_string()],
                auth_source: "external",
            },
            &SecurityConfig::default(),
        )
        .await
    }
}
