//! Domain service for authentication and user management.
//!
//! Handles login, logout, self-service profile updates and the admin user
//! CRUD surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::User;
use crate::domain::{Role, UserPrincipal, split_groups};

/// Why a credential did not resolve to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    MissingCredential,
    InvalidToken,
    TokenExpired,
    ExternalRejected,
}

impl UnauthenticatedReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "Missing credential",
            Self::InvalidToken => "Invalid token",
            Self::TokenExpired => "Token expired",
            Self::ExternalRejected => "External token rejected",
        }
    }
}

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{}", .0.as_str())]
    Unauthenticated(UnauthenticatedReason),

    #[error("Forbidden")]
    Forbidden,

    #[error("User not found")]
    UserNotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// User info DTO for responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub groups: Vec<String>,
    pub inventories: Vec<String>,
    pub auth_source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            groups: split_groups(&user.groups).into_iter().collect(),
            inventories: split_groups(&user.inventories).into_iter().collect(),
            username: user.username,
            email: user.email,
            role: user.role,
            auth_source: user.auth_source,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Login result containing the session token.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSelf {
    pub email: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub inventories: Vec<String>,
}

const fn default_role() -> Role {
    Role::User
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub inventories: Option<Vec<String>>,
    pub password: Option<String>,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and opens a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if login fails.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Ends the session identified by the raw `Authorization` header.
    async fn logout(&self, raw_header: &str) -> Result<(), AuthError>;

    async fn me(&self, user: &UserPrincipal) -> Result<UserInfo, AuthError>;

    /// Updates the caller's own email and password. Role and scope are
    /// admin-managed.
    async fn update_me(
        &self,
        user: &UserPrincipal,
        changes: UpdateSelf,
    ) -> Result<UserInfo, AuthError>;

    async fn list_users(&self) -> Result<Vec<UserInfo>, AuthError>;

    async fn create_user(&self, request: CreateUser) -> Result<UserInfo, AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] when demoting the last admin.
    async fn update_user(&self, username: &str, changes: UpdateUser)
    -> Result<UserInfo, AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] when deleting the last admin.
    async fn delete_user(&self, username: &str) -> Result<(), AuthError>;

    /// Creates the first admin account when the user table is empty.
    /// Returns the generated password when one had to be invented.
    async fn ensure_bootstrap_admin(&self) -> Result<Option<String>, AuthError>;
}
