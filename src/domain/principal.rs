//! Resolved caller identities and the credential forms they come from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::sets::split_groups;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Parses a stored role. Anything unrecognised is an ordinary user.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::User
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity attached to a request after credential validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    User(UserPrincipal),
    Host { host_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPrincipal {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
    pub groups: BTreeSet<String>,
    pub inventories: BTreeSet<String>,
}

impl UserPrincipal {
    #[must_use]
    pub fn new(
        user_id: i32,
        username: impl Into<String>,
        role: Role,
        groups: &str,
        inventories: &str,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            role,
            groups: split_groups(groups),
            inventories: split_groups(inventories),
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::User(user) if user.is_admin())
    }

    #[must_use]
    pub const fn as_user(&self) -> Option<&UserPrincipal> {
        match self {
            Self::User(user) => Some(user),
            Self::Host { .. } => None,
        }
    }

    /// Short label for logs and spans.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::User(user) => format!("user:{}", user.username),
            Self::Host { host_name } => format!("host:{host_name}"),
        }
    }
}

/// A classified `Authorization` header.
///
/// Classification happens once, in a fixed order, and the resolver matches on
/// the result instead of re-parsing the header per endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Matched a stored host key.
    HostKey { host_name: String },

    /// `Bearer` token to be validated by the external identity provider.
    ExternalBearer { token: String, full_header: String },

    /// Candidate local session token. `full_header` is set when the caller
    /// sent a `Bearer ` prefix, since some clients stored the prefixed form.
    SessionToken {
        token: String,
        full_header: Option<String>,
    },
}

/// Splits an optional `Bearer` prefix off a header.
///
/// Returns the trimmed token and whether the prefix was present. A bare
/// `Bearer` with nothing after it yields an empty token.
#[must_use]
pub fn split_bearer(raw: &str) -> (&str, bool) {
    let header = raw.trim();
    if header == "Bearer" {
        return ("", true);
    }
    header
        .strip_prefix("Bearer ")
        .map_or((header, false), |rest| (rest.trim(), true))
}

/// What a caller wants to do with a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    View,
    ReadLogs,
    ToggleComponent,
    SetVersion,
    RunJob,
    ScheduleDeletion,
    Delete,
    MoveInventory,
    ManageGroups,
    SelfReport,
    ReadConfig,
    WriteLog,
}

impl Operation {
    /// Operations a host key may perform on its own host.
    #[must_use]
    pub const fn is_host_self_service(&self) -> bool {
        matches!(self, Self::SelfReport | Self::ReadConfig | Self::WriteLog)
    }

    /// Operations a non-admin user may perform inside their scope.
    #[must_use]
    pub const fn is_operator_allowed(&self) -> bool {
        matches!(
            self,
            Self::View
                | Self::ReadLogs
                | Self::ReadConfig
                | Self::ToggleComponent
                | Self::SetVersion
                | Self::RunJob
        )
    }

    /// Whether the group scope applies on top of the inventory boundary.
    #[must_use]
    pub const fn is_group_scoped(&self) -> bool {
        matches!(self, Self::ToggleComponent | Self::SetVersion | Self::RunJob)
    }
}
