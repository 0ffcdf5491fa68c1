use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::IdentityConfig;
use crate::domain::Role;
use crate::services::principal::{ExternalIdentity, IdentityError, IdentityProvider};

/// Validates bearer tokens by calling the provider's `userinfo` endpoint.
/// A token the provider accepts is valid; its claims are mapped through the
/// configured claim paths.
#[derive(Clone)]
pub struct OidcUserInfoClient {
    client: Client,
    userinfo_url: String,
    username_claim: String,
    role_claim: String,
    admin_role: String,
    groups_claim: String,
}

impl OidcUserInfoClient {
    pub fn new(config: &IdentityConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent("fleetd/1.0")
            .build()?;

        Ok(Self {
            client,
            userinfo_url: config.userinfo_url.clone(),
            username_claim: config.username_claim.clone(),
            role_claim: config.role_claim.clone(),
            admin_role: config.admin_role.clone(),
            groups_claim: config.groups_claim.clone(),
        })
    }

    /// Maps raw claims. The role comes from the trusted role claim only.
    pub fn map_claims(&self, claims: &Value) -> Result<ExternalIdentity, IdentityError> {
        let username = claim(claims, &self.username_claim)
            .and_then(Value::as_str)
            .or_else(|| claims.get("sub").and_then(Value::as_str))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| IdentityError::Rejected("no username claim".to_string()))?;

        let is_admin = string_list(claim(claims, &self.role_claim))
            .iter()
            .any(|role| role == &self.admin_role);

        Ok(ExternalIdentity {
            username: username.to_string(),
            role: if is_admin { Role::Admin } else { Role::User },
            groups: string_list(claim(claims, &self.groups_claim))
                .into_iter()
                .map(|group| group.trim_start_matches('/').to_string())
                .filter(|group| !group.is_empty())
                .collect(),
        })
    }
}

/// Looks up a dotted claim path such as `realm_access.roles`.
fn claim<'a>(claims: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(claims, |value, segment| value.get(segment))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect(),
        Some(Value::String(single)) => single
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl IdentityProvider for OidcUserInfoClient {
    async fn validate_bearer(&self, token: &str) -> Result<ExternalIdentity, IdentityError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(IdentityError::Rejected("token not accepted".to_string()));
            }
            other => {
                return Err(IdentityError::Unavailable(format!(
                    "userinfo returned {other}"
                )));
            }
        }

        let claims: Value = response
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        debug!("Userinfo claims received");

        self.map_claims(&claims)
    }
}
