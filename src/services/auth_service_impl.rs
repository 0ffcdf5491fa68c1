//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{NewUser, Store, UserChanges, generate_token};
use crate::domain::{Role, UserPrincipal, split_bearer};
use crate::services::auth_service::{
    AuthError, AuthService, CreateUser, LoginResult, UnauthenticatedReason, UpdateSelf,
    UpdateUser, UserInfo,
};

const MIN_PASSWORD_LEN: usize = 8;

pub struct SeaOrmAuthService {
    store: Store,
    config: Config,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, config: Config) -> Self {
        Self { store, config }
    }

    fn validate_password(password: &str) -> Result<(), AuthError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }

    fn validate_username(username: &str) -> Result<(), AuthError> {
        if username.is_empty() || username.len() > 64 {
            return Err(AuthError::Validation(
                "Username must be 1-64 characters".to_string(),
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
        {
            return Err(AuthError::Validation(
                "Username contains invalid characters".to_string(),
            ));
        }
        Ok(())
    }

    fn normalize_inventories(&self, inventories: Vec<String>) -> Vec<String> {
        let cleaned: Vec<String> = inventories
            .into_iter()
            .map(|inv| inv.trim().to_string())
            .filter(|inv| !inv.is_empty())
            .collect();
        if cleaned.is_empty() {
            vec![self.config.fleet.default_inventory.clone()]
        } else {
            cleaned
        }
    }

    async fn ensure_inventories(&self, inventories: &[String]) -> Result<(), AuthError> {
        let repo = self.store.inventory_repo();
        for inventory in inventories {
            repo.ensure(inventory).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let Some(user) = self
            .store
            .verify_user_password(username.trim(), password)
            .await?
        else {
            warn!(username = %username, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        };

        let expires_at = Utc::now() + self.config.session_ttl();
        let session = self.store.create_session(user.id, expires_at).await?;
        info!(username = %user.username, "User logged in");

        Ok(LoginResult {
            token: session.token,
            username: user.username,
            role: user.role,
            expires_at: session.timeout,
        })
    }

    async fn logout(&self, raw_header: &str) -> Result<(), AuthError> {
        let header = raw_header.trim();
        let (token, has_prefix) = split_bearer(header);
        if token.is_empty() {
            return Err(AuthError::Unauthenticated(
                UnauthenticatedReason::MissingCredential,
            ));
        }

        let mut removed = self.store.delete_session(token).await?;
        if has_prefix {
            removed |= self.store.delete_session(header).await?;
        }
        if !removed {
            return Err(AuthError::Validation("No session to end".to_string()));
        }
        Ok(())
    }

    async fn me(&self, user: &UserPrincipal) -> Result<UserInfo, AuthError> {
        let record = self
            .store
            .get_user_by_id(user.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(UserInfo::from(record))
    }

    async fn update_me(
        &self,
        user: &UserPrincipal,
        changes: UpdateSelf,
    ) -> Result<UserInfo, AuthError> {
        if let Some(new_password) = changes.new_password.as_deref() {
            Self::validate_password(new_password)?;
            let current = changes.current_password.as_deref().unwrap_or_default();
            if self
                .store
                .verify_user_password(&user.username, current)
                .await?
                .is_none()
            {
                return Err(AuthError::Validation(
                    "Current password is incorrect".to_string(),
                ));
            }
            self.store
                .user_repo()
                .update_password(&user.username, new_password, &self.config.security)
                .await?;
        }

        let updated = self
            .store
            .user_repo()
            .update(
                &user.username,
                UserChanges {
                    email: changes.email.map(|e| e.trim().to_string()),
                    ..UserChanges::default()
                },
            )
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserInfo::from(updated))
    }

    async fn list_users(&self) -> Result<Vec<UserInfo>, AuthError> {
        let users = self.store.user_repo().list().await?;
        Ok(users.into_iter().map(UserInfo::from).collect())
    }

    async fn create_user(&self, request: CreateUser) -> Result<UserInfo, AuthError> {
        let username = request.username.trim().to_string();
        Self::validate_username(&username)?;
        Self::validate_password(&request.password)?;

        if self.store.get_user_by_username(&username).await?.is_some() {
            return Err(AuthError::Conflict(format!("User {username} already exists")));
        }

        let inventories = self.normalize_inventories(request.inventories);
        self.ensure_inventories(&inventories).await?;

        let user = self
            .store
            .create_user(
                NewUser {
                    username,
                    password: Some(request.password),
                    email: request.email.trim().to_string(),
                    role: request.role,
                    inventories,
                    auth_source: "local",
                },
                &self.config.security,
            )
            .await?;

        info!(username = %user.username, role = %user.role, "User created");
        Ok(UserInfo::from(user))
    }

    async fn update_user(
        &self,
        username: &str,
        changes: UpdateUser,
    ) -> Result<UserInfo, AuthError> {
        let existing = self
            .store
            .get_user_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if existing.role == Role::Admin
            && changes.role == Some(Role::User)
            && self.store.user_repo().count_admins().await? <= 1
        {
            return Err(AuthError::Conflict(
                "Cannot demote the last admin".to_string(),
            ));
        }

        let inventories = match changes.inventories {
            Some(list) => {
                let list = self.normalize_inventories(list);
                self.ensure_inventories(&list).await?;
                Some(list)
            }
            None => None,
        };

        if let Some(password) = changes.password.as_deref() {
            Self::validate_password(password)?;
            self.store
                .user_repo()
                .update_password(username, password, &self.config.security)
                .await?;
        }

        let updated = self
            .store
            .user_repo()
            .update(
                username,
                UserChanges {
                    email: changes.email.map(|e| e.trim().to_string()),
                    role: changes.role,
                    inventories,
                },
            )
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(username = %updated.username, "User updated");
        Ok(UserInfo::from(updated))
    }

    async fn delete_user(&self, username: &str) -> Result<(), AuthError> {
        let existing = self
            .store
            .get_user_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if existing.role == Role::Admin && self.store.user_repo().count_admins().await? <= 1 {
            return Err(AuthError::Conflict(
                "Cannot delete the last admin".to_string(),
            ));
        }

        if !self.store.user_repo().delete(username).await? {
            return Err(AuthError::UserNotFound);
        }
        info!(username = %username, "User deleted");
        Ok(())
    }

    async fn ensure_bootstrap_admin(&self) -> Result<Option<String>, AuthError> {
        if self.store.user_repo().count().await? > 0 {
            return Ok(None);
        }

        let security = &self.config.security;
        let (password, generated) = match security.bootstrap_admin_password.clone() {
            Some(password) if !password.is_empty() => (password, false),
            _ => (generate_token()[..24].to_string(), true),
        };

        let inventory = self.config.fleet.default_inventory.clone();
        self.store.inventory_repo().ensure(&inventory).await?;
        self.store
            .create_user(
                NewUser {
                    username: security.bootstrap_admin_username.clone(),
                    password: Some(password.clone()),
                    email: String::new(),
                    role: Role::Admin,
                    inventories: vec![inventory],
                    auth_source: "local",
                },
                security,
            )
            .await?;

        info!(username = %security.bootstrap_admin_username, "Created bootstrap admin");
        Ok(generated.then_some(password))
    }
}
