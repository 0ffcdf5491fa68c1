//! Groups and inventories.
//!
//! Group membership lives in the association tables; after every change
//! the comma projections on hosts and users are recomputed.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::db::Store;
use crate::domain::{GROUP_DELIMITER, Principal, join_set};
use crate::services::access::{self, AccessDenied, InventorySummary};
use crate::services::host_registry::{HostRegistry, RegistryError, validate_label};

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for FleetError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

impl From<AccessDenied> for FleetError {
    fn from(_: AccessDenied) -> Self {
        Self::Forbidden
    }
}

impl From<RegistryError> for FleetError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Invalid(msg) => Self::Invalid(msg),
            RegistryError::NotFound(name) => Self::NotFound(format!("Host {name}")),
            RegistryError::Conflict(msg) => Self::Conflict(msg),
            RegistryError::Forbidden | RegistryError::Unauthenticated => Self::Forbidden,
            RegistryError::Database(msg) => Self::Database(msg),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub id: i32,
    pub name: String,
}

pub struct FleetService {
    store: Store,
    registry: Arc<HostRegistry>,
    default_inventory: String,
}

impl FleetService {
    #[must_use]
    pub const fn new(store: Store, registry: Arc<HostRegistry>, default_inventory: String) -> Self {
        Self {
            store,
            registry,
            default_inventory,
        }
    }

    /// Name and host count per inventory. Non-admins only see their own.
    pub async fn list_inventories(
        &self,
        principal: &Principal,
    ) -> Result<Vec<InventorySummary>, FleetError> {
        access::require_user(principal)?;

        let counts = self.store.host_repo().count_by_inventory().await?;
        let mut summaries: BTreeMap<String, u64> = self
            .store
            .inventory_repo()
            .list()
            .await?
            .into_iter()
            .map(|inv| (inv.name, 0))
            .collect();
        for (name, count) in counts {
            summaries.insert(name, count);
        }

        let summaries = summaries
            .into_iter()
            .map(|(name, host_count)| InventorySummary { name, host_count })
            .collect();
        Ok(access::filter_inventories(principal, summaries)?)
    }

    pub async fn create_inventory(
        &self,
        principal: &Principal,
        name: &str,
    ) -> Result<InventorySummary, FleetError> {
        access::require_admin(principal)?;
        let name = validate_label(name, "inventory")?;

        let repo = self.store.inventory_repo();
        if repo.find_by_name(name).await?.is_some() {
            return Err(FleetError::Conflict(format!("Inventory {name} already exists")));
        }
        let inventory = repo.create(name).await?;
        info!(inventory = %inventory.name, "Inventory created");

        Ok(InventorySummary {
            name: inventory.name,
            host_count: 0,
        })
    }

    /// Refuses to delete the default inventory or one that still has hosts.
    pub async fn delete_inventory(&self, principal: &Principal, name: &str) -> Result<(), FleetError> {
        access::require_admin(principal)?;

        if name == self.default_inventory {
            return Err(FleetError::Conflict(
                "The default inventory cannot be deleted".to_string(),
            ));
        }
        let repo = self.store.inventory_repo();
        if repo.find_by_name(name).await?.is_none() {
            return Err(FleetError::NotFound(format!("Inventory {name}")));
        }

        let counts = self.store.host_repo().count_by_inventory().await?;
        if counts.get(name).copied().unwrap_or(0) > 0 {
            return Err(FleetError::Conflict(format!("Inventory {name} still has hosts")));
        }

        repo.delete(name).await?;
        info!(inventory = %name, "Inventory deleted");
        Ok(())
    }

    pub async fn list_groups(&self, principal: &Principal) -> Result<Vec<GroupSummary>, FleetError> {
        access::require_admin(principal)?;
        let groups = self.store.group_repo().list().await?;
        Ok(groups
            .into_iter()
            .map(|g| GroupSummary {
                id: g.id,
                name: g.name,
            })
            .collect())
    }

    pub async fn create_group(
        &self,
        principal: &Principal,
        name: &str,
    ) -> Result<GroupSummary, FleetError> {
        access::require_admin(principal)?;
        let name = validate_label(name, "group")?;

        let repo = self.store.group_repo();
        if repo.find_by_name(name).await?.is_some() {
            return Err(FleetError::Conflict(format!("Group {name} already exists")));
        }
        let group = repo.create(name).await?;
        info!(group = %group.name, "Group created");
        Ok(GroupSummary {
            id: group.id,
            name: group.name,
        })
    }

    pub async fn delete_group(&self, principal: &Principal, name: &str) -> Result<(), FleetError> {
        access::require_admin(principal)?;
        let repo = self.store.group_repo();
        let group = repo
            .find_by_name(name)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("Group {name}")))?;

        let (_, user_ids) = repo.delete(group.id).await?;
        for user_id in user_ids {
            self.refresh_user_groups(user_id).await?;
        }
        self.registry.sync_host_groups().await?;

        info!(group = %name, "Group deleted");
        Ok(())
    }

    pub async fn set_host_membership(
        &self,
        principal: &Principal,
        group: &str,
        host: &str,
        member: bool,
    ) -> Result<(), FleetError> {
        access::require_admin(principal)?;
        let group = self
            .store
            .group_repo()
            .find_by_name(group)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("Group {group}")))?;
        let host_id = self
            .registry
            .host_id(host)
            .await
            .ok_or_else(|| FleetError::NotFound(format!("Host {host}")))?;

        let repo = self.store.group_repo();
        if member {
            repo.add_host(group.id, host_id).await?;
        } else if !repo.remove_host(group.id, host_id).await? {
            return Err(FleetError::NotFound(format!(
                "Host {host} in group {}",
                group.name
            )));
        }

        self.registry.sync_host_groups().await?;
        Ok(())
    }

    pub async fn set_user_membership(
        &self,
        principal: &Principal,
        group: &str,
        username: &str,
        member: bool,
    ) -> Result<(), FleetError> {
        access::require_admin(principal)?;
        let group = self
            .store
            .group_repo()
            .find_by_name(group)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("Group {group}")))?;
        let user = self
            .store
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("User {username}")))?;

        let repo = self.store.group_repo();
        if member {
            repo.add_user(group.id, user.id).await?;
        } else if !repo.remove_user(group.id, user.id).await? {
            return Err(FleetError::NotFound(format!(
                "User {username} in group {}",
                group.name
            )));
        }

        self.refresh_user_groups(user.id).await
    }

    async fn refresh_user_groups(&self, user_id: i32) -> Result<(), FleetError> {
        let names = self.store.group_repo().names_for_user(user_id).await?;
        self.store
            .user_repo()
            .set_groups(user_id, &join_set(&names, GROUP_DELIMITER))
            .await?;
        Ok(())
    }
}
