use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{NIL, split_components, split_groups};
use crate::entities::hosts;

/// Status shown to operators. Derived at read time from `updated_at` and
/// `up_for_deletion`; the stored `status` column only mirrors the last value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HostStatus {
    Online,
    Offline,
    #[serde(rename = "Scheduled for deletion")]
    ScheduledForDeletion,
}

impl HostStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Offline => "Offline",
            Self::ScheduledForDeletion => "Scheduled for deletion",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub id: i32,
    pub name: String,
    pub ip_address: String,
    pub cpu_cores: i32,
    pub ram: String,
    pub os: String,
    pub monokit_version: String,
    pub disabled_components: String,
    pub installed_components: String,
    pub status: String,
    pub groups: String,
    pub inventory: String,
    pub up_for_deletion: bool,
    pub wants_update_to: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<hosts::Model> for Host {
    fn from(model: hosts::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            ip_address: model.ip_address,
            cpu_cores: model.cpu_cores,
            ram: model.ram,
            os: model.os,
            monokit_version: model.monokit_version,
            disabled_components: model.disabled_components,
            installed_components: model.installed_components,
            status: model.status,
            groups: model.groups,
            inventory: model.inventory,
            up_for_deletion: model.up_for_deletion,
            wants_update_to: model.wants_update_to,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl Host {
    #[must_use]
    pub fn is_offline(&self, now: DateTime<Utc>, offline_after: Duration) -> bool {
        now - self.updated_at > offline_after
    }

    #[must_use]
    pub fn derived_status(&self, now: DateTime<Utc>, offline_after: Duration) -> HostStatus {
        if self.up_for_deletion {
            HostStatus::ScheduledForDeletion
        } else if self.is_offline(now, offline_after) {
            HostStatus::Offline
        } else {
            HostStatus::Online
        }
    }

    /// Copy with `status` replaced by the value derived at `now`.
    #[must_use]
    pub fn with_derived_status(mut self, now: DateTime<Utc>, offline_after: Duration) -> Self {
        self.status = self.derived_status(now, offline_after).as_str().to_string();
        self
    }

    /// Both offline and scheduled: the lazy reconciler may hard-delete it.
    #[must_use]
    pub fn is_due_for_deletion(&self, now: DateTime<Utc>, offline_after: Duration) -> bool {
        self.up_for_deletion && self.is_offline(now, offline_after)
    }

    #[must_use]
    pub fn group_set(&self) -> std::collections::BTreeSet<String> {
        split_groups(&self.groups)
    }

    #[must_use]
    pub fn disabled_component_set(&self) -> std::collections::BTreeSet<String> {
        split_components(&self.disabled_components)
    }
}

/// Payload an agent sends on every check-in.
///
/// Only agent-owned fields are accepted. Operator-controlled columns
/// (`up_for_deletion`, `wants_update_to`, `disabled_components`, `groups`)
/// are not part of the report and cannot be overwritten by it.
#[derive(Debug, Clone, Deserialize)]
pub struct HostReport {
    pub name: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub cpu_cores: i32,
    #[serde(default)]
    pub ram: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub monokit_version: String,
    #[serde(default)]
    pub installed_components: String,
    /// Honoured only when the host is first created.
    #[serde(default)]
    pub inventory: Option<String>,
}

impl HostReport {
    #[must_use]
    pub fn installed_components_or_nil(&self) -> String {
        if self.installed_components.trim().is_empty() {
            NIL.to_string()
        } else {
            self.installed_components.trim().to_string()
        }
    }
}
