//! Authoritative, cached view of the fleet.
//!
//! The cache is keyed by host name and guarded by a single `RwLock`. Every
//! mutation holds the write lock across its store write and cache update,
//! which also serializes concurrent registrations of the same name.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Store;
use crate::domain::{
    COMPONENT_DELIMITER, GROUP_DELIMITER, NIL, Operation, Principal, join_set, split_bearer,
};
use crate::models::{Host, HostReport};
use crate::services::access::{self, AccessDenied, Scope};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Host key required")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("Host not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Invalid(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for RegistryError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

impl RegistryError {
    fn denied(denied: AccessDenied, name: &str) -> Self {
        match denied {
            AccessDenied::NotFound => Self::NotFound(name.to_string()),
            AccessDenied::Forbidden => Self::Forbidden,
        }
    }
}

/// Result of a self-report.
#[derive(Debug, Clone)]
pub enum RegistrationOutcome {
    /// First registration. The key is handed out exactly once.
    Created { host: Host, api_key: String },
    Updated { host: Host },
}

/// What an agent needs to apply operator intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostConfig {
    pub name: String,
    pub disabled_components: Vec<String>,
    pub wants_update_to: String,
    pub up_for_deletion: bool,
}

/// A rename performed by duplicate repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamedHost {
    pub id: i32,
    pub from: String,
    pub to: String,
}

pub struct HostRegistry {
    store: Store,
    cache: Arc<RwLock<HashMap<String, Host>>>,
    offline_after: Duration,
    default_inventory: String,
}

impl HostRegistry {
    #[must_use]
    pub fn new(store: Store, config: &Config) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(HashMap::new())),
            offline_after: config.offline_after(),
            default_inventory: config.fleet.default_inventory.clone(),
        }
    }

    /// Startup reconciliation: repair duplicate names, then enforce name
    /// uniqueness and load the cache.
    pub async fn initialize(&self) -> Result<(), RegistryError> {
        let renamed = self.repair_duplicate_names().await?;
        if !renamed.is_empty() {
            info!(count = renamed.len(), "Repaired duplicate host names");
        }

        self.store.host_repo().ensure_unique_name_index().await?;
        self.store
            .inventory_repo()
            .ensure(&self.default_inventory)
            .await?;

        let loaded = self.load().await?;
        info!(hosts = loaded, "Host registry loaded");
        Ok(())
    }

    /// Replaces the cache with the stored hosts. Returns how many were loaded.
    pub async fn load(&self) -> Result<usize, RegistryError> {
        let mut cache = self.cache.write().await;
        self.reload(&mut cache).await?;
        Ok(cache.len())
    }

    async fn reload(&self, cache: &mut HashMap<String, Host>) -> Result<(), RegistryError> {
        let hosts = self.store.host_repo().list_all().await?;
        cache.clear();
        for host in hosts {
            // Ordered by id, so the lowest id wins a name clash.
            cache.entry(host.name.clone()).or_insert(host);
        }
        Ok(())
    }

    fn present(&self, host: Host, now: DateTime<Utc>) -> Host {
        host.with_derived_status(now, self.offline_after)
    }

    /// Every cached host with its derived status, ordered by id.
    pub async fn snapshot(&self) -> Vec<Host> {
        let now = Utc::now();
        let cache = self.cache.read().await;
        let mut hosts: Vec<Host> = cache
            .values()
            .cloned()
            .map(|host| self.present(host, now))
            .collect();
        hosts.sort_by_key(|host| host.id);
        hosts
    }

    /// Self-report from an agent.
    ///
    /// An unknown name creates the host and mints its key. A known name
    /// requires that key in `auth_header`, raw or `Bearer`-prefixed, and
    /// then only refreshes agent-owned fields.
    pub async fn register(
        &self,
        report: HostReport,
        auth_header: Option<&str>,
    ) -> Result<RegistrationOutcome, RegistryError> {
        let name = validate_host_name(&report.name)?.to_string();
        let now = Utc::now();

        let mut cache = self.cache.write().await;

        let existing = match cache.get(&name) {
            Some(host) => Some(host.clone()),
            None => self.store.host_repo().find_by_name(&name).await?,
        };

        match existing {
            None => {
                let inventory = report
                    .inventory
                    .as_deref()
                    .map(str::trim)
                    .filter(|inv| !inv.is_empty())
                    .unwrap_or(&self.default_inventory)
                    .to_string();
                validate_label(&inventory, "inventory")?;

                self.store.inventory_repo().ensure(&inventory).await?;
                let host = self.store.host_repo().insert(&report, &inventory, now).await?;
                let key = self.store.host_key_repo().mint(&name).await?;

                cache.insert(name.clone(), host.clone());
                drop(cache);

                metrics::counter!("fleet_hosts_registered_total").increment(1);
                info!(host = %name, inventory = %inventory, "Registered new host");

                Ok(RegistrationOutcome::Created {
                    host: self.present(host, now),
                    api_key: key.token,
                })
            }
            Some(current) => {
                let presented = auth_header
                    .map(|header| split_bearer(header).0)
                    .filter(|token| !token.is_empty())
                    .ok_or(RegistryError::Unauthenticated)?;

                let key = self.store.host_key_repo().find_by_host(&name).await?;
                if key.is_none_or(|key| key.token != presented) {
                    warn!(host = %name, "Rejected self-report with wrong host key");
                    return Err(RegistryError::Forbidden);
                }

                if let Some(requested) = report.inventory.as_deref().map(str::trim)
                    && !requested.is_empty()
                    && requested != current.inventory
                {
                    warn!(
                        host = %name,
                        current = %current.inventory,
                        requested = %requested,
                        "Ignoring inventory change from self-report"
                    );
                }

                let host = self
                    .store
                    .host_repo()
                    .apply_report(current.id, &report, now)
                    .await?
                    .ok_or_else(|| RegistryError::NotFound(name.clone()))?;

                cache.insert(name, host.clone());
                Ok(RegistrationOutcome::Updated {
                    host: self.present(host, now),
                })
            }
        }
    }

    /// Scoped listing.
    ///
    /// The admin path reconciles first: scheduled hosts that went offline
    /// are hard-deleted. All paths refresh group projections. Failures of
    /// either pass are logged and the listing falls back to the cache.
    pub async fn list_for(&self, principal: &Principal) -> Result<Vec<Host>, RegistryError> {
        if matches!(principal, Principal::Host { .. }) {
            return Err(RegistryError::Forbidden);
        }

        if principal.is_admin()
            && let Err(e) = self.reconcile_and_maybe_delete(Utc::now()).await
        {
            warn!(error = %e, "Lazy host deletion failed");
        }

        if let Err(e) = self.sync_host_groups().await {
            warn!(error = %e, "Host group sync failed");
        }

        Ok(access::filter_hosts(
            principal,
            self.snapshot().await,
            Scope::Inventory,
        ))
    }

    /// Hard-deletes every host that is both scheduled for deletion and
    /// offline at `now`. Returns the deleted names.
    pub async fn reconcile_and_maybe_delete(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, RegistryError> {
        let mut cache = self.cache.write().await;
        let repo = self.store.host_repo();

        let mut deleted = Vec::new();
        for host in repo.list_all().await? {
            if host.is_due_for_deletion(now, self.offline_after) {
                if repo.delete(host.id).await? {
                    info!(host = %host.name, id = host.id, "Deleted host scheduled for deletion");
                    metrics::counter!("fleet_hosts_deleted_total").increment(1);
                    deleted.push(host.name);
                }
                continue;
            }

            let status = host.derived_status(now, self.offline_after).as_str();
            if host.status != status {
                repo.set_status(host.id, status).await?;
            }
        }

        self.reload(&mut cache).await?;
        Ok(deleted)
    }

    /// Keeps the lowest id of each name and renames the rest to
    /// `<name>-<k>` in ascending id order, skipping names already taken.
    pub async fn repair_duplicate_names(&self) -> Result<Vec<RenamedHost>, RegistryError> {
        let mut cache = self.cache.write().await;
        let repo = self.store.host_repo();

        let hosts = repo.list_all().await?;
        let mut taken: HashSet<String> = hosts.iter().map(|h| h.name.clone()).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut next_suffix: HashMap<String, u32> = HashMap::new();
        let mut renamed = Vec::new();

        for host in hosts {
            if seen.insert(host.name.clone()) {
                continue;
            }

            let counter = next_suffix.entry(host.name.clone()).or_insert(1);
            let mut candidate = format!("{}-{}", host.name, counter);
            while taken.contains(&candidate) {
                *counter += 1;
                candidate = format!("{}-{}", host.name, counter);
            }
            *counter += 1;

            repo.rename(host.id, &candidate).await?;
            warn!(id = host.id, from = %host.name, to = %candidate, "Renamed duplicate host");
            taken.insert(candidate.clone());
            renamed.push(RenamedHost {
                id: host.id,
                from: host.name,
                to: candidate,
            });
        }

        self.reload(&mut cache).await?;
        Ok(renamed)
    }

    /// Recomputes each host's `groups` column from the association table.
    /// Returns how many hosts changed.
    pub async fn sync_host_groups(&self) -> Result<usize, RegistryError> {
        let mut cache = self.cache.write().await;
        let repo = self.store.host_repo();

        let memberships = self.store.group_repo().names_by_host().await?;
        let mut changed = 0;
        for host in repo.list_all().await? {
            let projected = memberships
                .get(&host.id)
                .map_or_else(|| NIL.to_string(), |names| join_set(names, GROUP_DELIMITER));
            if host.groups != projected {
                repo.set_groups(host.id, &projected).await?;
                changed += 1;
            }
        }

        self.reload(&mut cache).await?;
        Ok(changed)
    }

    /// Looks up a host and checks `operation` against it.
    pub async fn authorize(
        &self,
        principal: &Principal,
        name: &str,
        operation: Operation,
    ) -> Result<Host, RegistryError> {
        let cache = self.cache.read().await;
        let host = cache
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        drop(cache);

        access::authorize(principal, &host, operation)
            .map_err(|denied| RegistryError::denied(denied, name))?;
        Ok(self.present(host, Utc::now()))
    }

    pub async fn get_for(&self, principal: &Principal, name: &str) -> Result<Host, RegistryError> {
        self.authorize(principal, name, Operation::View).await
    }

    pub async fn config_for(
        &self,
        principal: &Principal,
        name: &str,
    ) -> Result<HostConfig, RegistryError> {
        let host = self.authorize(principal, name, Operation::ReadConfig).await?;
        Ok(HostConfig {
            disabled_components: host.disabled_component_set().into_iter().collect(),
            name: host.name,
            wants_update_to: host.wants_update_to,
            up_for_deletion: host.up_for_deletion,
        })
    }

    /// Shared shape of every operator mutation: authorize against the
    /// cached row, write through, refresh the cache entry.
    async fn mutate<F, Fut>(
        &self,
        principal: &Principal,
        name: &str,
        operation: Operation,
        write: F,
    ) -> Result<Host, RegistryError>
    where
        F: FnOnce(Host) -> Fut,
        Fut: std::future::Future<Output = Result<Option<Host>, RegistryError>>,
    {
        let mut cache = self.cache.write().await;
        let host = cache
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        access::authorize(principal, &host, operation)
            .map_err(|denied| RegistryError::denied(denied, name))?;

        let updated = write(host)
            .await?
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        cache.insert(updated.name.clone(), updated.clone());
        Ok(self.present(updated, Utc::now()))
    }

    /// Enables or disables a component. Idempotent.
    pub async fn toggle_component(
        &self,
        principal: &Principal,
        name: &str,
        component: &str,
        enabled: bool,
    ) -> Result<Host, RegistryError> {
        let component = validate_label(component, "component")?.to_string();
        let repo = self.store.host_repo();

        self.mutate(principal, name, Operation::ToggleComponent, |host| async move {
            let mut disabled: BTreeSet<String> = host.disabled_component_set();
            let changed = if enabled {
                disabled.remove(&component)
            } else {
                disabled.insert(component.clone())
            };
            if !changed {
                return Ok(Some(host));
            }

            info!(host = %host.name, component = %component, enabled, "Component toggled");
            let value = join_set(&disabled, COMPONENT_DELIMITER);
            Ok(repo.set_disabled_components(host.id, &value).await?)
        })
        .await
    }

    /// Pins the version the agent should move to. An empty version clears
    /// the request.
    pub async fn set_version(
        &self,
        principal: &Principal,
        name: &str,
        version: &str,
    ) -> Result<Host, RegistryError> {
        let version = version.trim().to_string();
        if !version.is_empty() {
            validate_label(&version, "version")?;
        }
        let repo = self.store.host_repo();

        self.mutate(principal, name, Operation::SetVersion, |host| async move {
            if host.wants_update_to == version {
                return Ok(Some(host));
            }
            Ok(repo.set_wants_update_to(host.id, &version).await?)
        })
        .await
    }

    pub async fn schedule_deletion(
        &self,
        principal: &Principal,
        name: &str,
        up_for_deletion: bool,
    ) -> Result<Host, RegistryError> {
        let repo = self.store.host_repo();

        self.mutate(principal, name, Operation::ScheduleDeletion, |host| async move {
            if host.up_for_deletion == up_for_deletion {
                return Ok(Some(host));
            }
            info!(host = %host.name, up_for_deletion, "Deletion flag changed");
            Ok(repo.set_up_for_deletion(host.id, up_for_deletion).await?)
        })
        .await
    }

    /// Moves a host to another existing inventory.
    pub async fn move_inventory(
        &self,
        principal: &Principal,
        name: &str,
        inventory: &str,
    ) -> Result<Host, RegistryError> {
        let inventory = validate_label(inventory, "inventory")?.to_string();
        if self
            .store
            .inventory_repo()
            .find_by_name(&inventory)
            .await?
            .is_none()
        {
            return Err(RegistryError::Invalid(format!(
                "Unknown inventory: {inventory}"
            )));
        }
        let repo = self.store.host_repo();

        self.mutate(principal, name, Operation::MoveInventory, |host| async move {
            if host.inventory == inventory {
                return Ok(Some(host));
            }
            info!(host = %host.name, from = %host.inventory, to = %inventory, "Host moved");
            Ok(repo.set_inventory(host.id, &inventory).await?)
        })
        .await
    }

    /// Admin hard delete: host row, host key and group links.
    pub async fn delete_host(&self, principal: &Principal, name: &str) -> Result<(), RegistryError> {
        let mut cache = self.cache.write().await;
        let host = cache
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        access::authorize(principal, &host, Operation::Delete)
            .map_err(|denied| RegistryError::denied(denied, name))?;

        if !self.store.host_repo().delete(host.id).await? {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        cache.remove(name);
        drop(cache);

        metrics::counter!("fleet_hosts_deleted_total").increment(1);
        info!(host = %name, "Host deleted");
        Ok(())
    }

    /// Id of a host by name, bypassing scope. For admin-only callers.
    pub async fn host_id(&self, name: &str) -> Option<i32> {
        self.cache.read().await.get(name).map(|host| host.id)
    }
}

/// Host names become URL path segments and key bindings.
pub fn validate_host_name(name: &str) -> Result<&str, RegistryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RegistryError::Invalid("Host name cannot be empty".to_string()));
    }
    if name.len() > 253 {
        return Err(RegistryError::Invalid("Host name is too long".to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(RegistryError::Invalid(format!(
            "Host name contains invalid characters: {name}"
        )));
    }
    Ok(name)
}

/// Component, version and inventory labels. Must not contain the set
/// delimiters or be the empty-set sentinel.
pub fn validate_label<'a>(value: &'a str, what: &str) -> Result<&'a str, RegistryError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RegistryError::Invalid(format!("{what} cannot be empty")));
    }
    if value.len() > 128 {
        return Err(RegistryError::Invalid(format!("{what} is too long")));
    }
    if value == NIL
        || value.contains(GROUP_DELIMITER)
        || value.contains(COMPONENT_DELIMITER)
        || value.chars().any(|c| c.is_whitespace() || c == '/')
    {
        return Err(RegistryError::Invalid(format!("Invalid {what}: {value}")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, UserPrincipal};
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};

    fn report(name: &str) -> HostReport {
        HostReport {
            name: name.to_string(),
            ip_address: "10.0.0.5".to_string(),
            cpu_cores: 4,
            ram: "8GB".to_string(),
            os: "Debian 12".to_string(),
            monokit_version: "5.1.0".to_string(),
            installed_components: "osHealth::mysqlHealth".to_string(),
            inventory: None,
        }
    }

    fn admin() -> Principal {
        Principal::User(UserPrincipal::new(1, "root", Role::Admin, NIL, NIL))
    }

    async fn registry() -> (Store, HostRegistry) {
        let store = Store::in_memory().await.unwrap();
        let registry = HostRegistry::new(store.clone(), &Config::default());
        registry.initialize().await.unwrap();
        (store, registry)
    }

    async fn backdate(store: &Store, name: &str, minutes: i64) {
        let host = store.host_repo().find_by_name(name).await.unwrap().unwrap();
        let model = crate::entities::hosts::Entity::find_by_id(host.id)
            .one(&store.conn)
            .await
            .unwrap()
            .unwrap();
        let mut active: crate::entities::hosts::ActiveModel = model.into();
        active.updated_at = Set(Utc::now() - Duration::minutes(minutes));
        active.update(&store.conn).await.unwrap();
    }

    #[tokio::test]
    async fn first_registration_creates_and_mints_key() {
        let (_, registry) = registry().await;

        let outcome = registry.register(report("web1"), None).await.unwrap();
        let RegistrationOutcome::Created { host, api_key } = outcome else {
            panic!("expected creation");
        };
        assert_eq!(host.name, "web1");
        assert_eq!(host.inventory, "default");
        assert_eq!(host.status, "Online");
        assert_eq!(api_key.len(), 64);
    }

    #[tokio::test]
    async fn re_registration_requires_matching_key() {
        let (_, registry) = registry().await;

        let RegistrationOutcome::Created { host, api_key } =
            registry.register(report("web1"), None).await.unwrap()
        else {
            panic!("expected creation");
        };

        assert!(matches!(
            registry.register(report("web1"), None).await,
            Err(RegistryError::Unauthenticated)
        ));
        assert!(matches!(
            registry.register(report("web1"), Some("wrong")).await,
            Err(RegistryError::Forbidden)
        ));

        registry
            .schedule_deletion(&admin(), "web1", true)
            .await
            .unwrap();

        let mut next = report("web1");
        next.ip_address = "10.0.0.9".to_string();
        let outcome = registry
            .register(next, Some(&format!("Bearer {api_key}")))
            .await
            .unwrap();
        let RegistrationOutcome::Updated { host: updated } = outcome else {
            panic!("expected update");
        };
        assert_eq!(updated.id, host.id);
        assert!(updated.up_for_deletion);
        assert_eq!(updated.ip_address, "10.0.0.9");
        assert_eq!(updated.status, "Scheduled for deletion");
    }

    #[tokio::test]
    async fn report_cannot_move_inventory_or_reset_operator_fields() {
        let (_, registry) = registry().await;
        let RegistrationOutcome::Created { api_key, .. } =
            registry.register(report("web1"), None).await.unwrap()
        else {
            panic!("expected creation");
        };

        registry
            .toggle_component(&admin(), "web1", "mysqlHealth", false)
            .await
            .unwrap();
        registry.set_version(&admin(), "web1", "5.2.0").await.unwrap();

        let mut next = report("web1");
        next.inventory = Some("other".to_string());
        let RegistrationOutcome::Updated { host } =
            registry.register(next, Some(&api_key)).await.unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(host.inventory, "default");
        assert_eq!(host.disabled_components, "mysqlHealth");
        assert_eq!(host.wants_update_to, "5.2.0");
    }

    #[tokio::test]
    async fn duplicate_names_are_repaired_by_id_order() {
        let store = Store::in_memory().await.unwrap();
        let repo = store.host_repo();
        for _ in 0..3 {
            repo.insert(&report("db"), "default", Utc::now()).await.unwrap();
        }

        let registry = HostRegistry::new(store.clone(), &Config::default());
        registry.initialize().await.unwrap();

        let names: Vec<(i32, String)> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|h| (h.id, h.name))
            .collect();
        assert_eq!(
            names,
            vec![
                (1, "db".to_string()),
                (2, "db-1".to_string()),
                (3, "db-2".to_string())
            ]
        );

        // The unique index is now in place.
        assert!(repo.insert(&report("db"), "default", Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn admin_listing_deletes_stale_scheduled_hosts_only() {
        let (store, registry) = registry().await;
        registry.register(report("old"), None).await.unwrap();
        registry.register(report("fresh"), None).await.unwrap();
        registry.schedule_deletion(&admin(), "old", true).await.unwrap();
        registry.schedule_deletion(&admin(), "fresh", true).await.unwrap();
        backdate(&store, "old", 10).await;
        backdate(&store, "fresh", 1).await;

        let hosts = registry.list_for(&admin()).await.unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].name, "fresh");
        assert_eq!(hosts[0].status, "Scheduled for deletion");

        assert!(store.host_repo().find_by_name("old").await.unwrap().is_none());
        assert!(store.host_key_repo().find_by_host("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn user_listing_is_scoped_and_never_deletes() {
        let (store, registry) = registry().await;
        let mut lab = report("lab1");
        lab.inventory = Some("lab".to_string());
        registry.register(lab, None).await.unwrap();
        registry.register(report("web1"), None).await.unwrap();
        registry.schedule_deletion(&admin(), "web1", true).await.unwrap();
        backdate(&store, "web1", 10).await;

        let user = Principal::User(UserPrincipal::new(5, "bob", Role::User, NIL, "default"));
        let hosts = registry.list_for(&user).await.unwrap();
        let names: Vec<_> = hosts.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["web1"]);
        assert!(matches!(
            registry.get_for(&user, "lab1").await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.delete_host(&user, "web1").await,
            Err(RegistryError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn host_principal_cannot_list_or_touch_others() {
        let (_, registry) = registry().await;
        registry.register(report("web1"), None).await.unwrap();
        registry.register(report("web2"), None).await.unwrap();
        let principal = Principal::Host {
            host_name: "web1".to_string(),
        };

        assert!(matches!(
            registry.list_for(&principal).await,
            Err(RegistryError::Forbidden)
        ));
        assert!(registry.config_for(&principal, "web1").await.is_ok());
        assert!(matches!(
            registry.config_for(&principal, "web2").await,
            Err(RegistryError::Forbidden)
        ));
        assert!(matches!(
            registry.toggle_component(&principal, "web1", "osHealth", false).await,
            Err(RegistryError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn toggling_is_idempotent_and_visible_in_config() {
        let (_, registry) = registry().await;
        registry.register(report("web1"), None).await.unwrap();

        for _ in 0..2 {
            registry
                .toggle_component(&admin(), "web1", "osHealth", false)
                .await
                .unwrap();
        }
        let config = registry.config_for(&admin(), "web1").await.unwrap();
        assert_eq!(config.disabled_components, vec!["osHealth".to_string()]);

        let host = registry
            .toggle_component(&admin(), "web1", "osHealth", true)
            .await
            .unwrap();
        assert_eq!(host.disabled_components, NIL);

        assert!(matches!(
            registry.toggle_component(&admin(), "web1", "a::b", false).await,
            Err(RegistryError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn group_projection_follows_association_table() {
        let (store, registry) = registry().await;
        registry.register(report("web1"), None).await.unwrap();
        let host_id = registry.host_id("web1").await.unwrap();

        let groups = store.group_repo();
        let ops = groups.create("ops").await.unwrap();
        groups.add_host(ops.id, host_id).await.unwrap();

        assert_eq!(registry.sync_host_groups().await.unwrap(), 1);
        assert_eq!(registry.get_for(&admin(), "web1").await.unwrap().groups, "ops");

        groups.remove_host(ops.id, host_id).await.unwrap();
        registry.sync_host_groups().await.unwrap();
        assert_eq!(registry.get_for(&admin(), "web1").await.unwrap().groups, NIL);
    }

    #[tokio::test]
    async fn moving_requires_existing_inventory() {
        let (store, registry) = registry().await;
        registry.register(report("web1"), None).await.unwrap();

        assert!(matches!(
            registry.move_inventory(&admin(), "web1", "prod").await,
            Err(RegistryError::Invalid(_))
        ));

        store.inventory_repo().create("prod").await.unwrap();
        let host = registry.move_inventory(&admin(), "web1", "prod").await.unwrap();
        assert_eq!(host.inventory, "prod");
    }

    #[tokio::test]
    async fn bare_bearer_is_not_a_host_key() {
        let (_, registry) = registry().await;
        registry.register(report("web1"), None).await.unwrap();

        for header in ["Bearer", "Bearer ", "Bearer    "] {
            assert!(matches!(
                registry.register(report("web1"), Some(header)).await,
                Err(RegistryError::Unauthenticated)
            ));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_registrations_create_one_host() {
        let (store, registry) = registry().await;
        let registry = Arc::new(registry);

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.spawn(async move { registry.register(report("web1"), None).await });
        }

        let mut created = 0;
        let mut unauthenticated = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined.unwrap() {
                Ok(RegistrationOutcome::Created { .. }) => created += 1,
                Err(RegistryError::Unauthenticated) => unauthenticated += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(unauthenticated, 15);
        assert_eq!(store.host_repo().list_all().await.unwrap().len(), 1);
        assert_eq!(registry.snapshot().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn listing_races_with_registrations_and_toggles() {
        let (store, registry) = registry().await;
        let registry = Arc::new(registry);
        registry.register(report("base"), None).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..8 {
            let reg_a = registry.clone();
            tasks.spawn(async move {
                reg_a.register(report(&format!("web{i}")), None).await?;
                Ok::<_, RegistryError>(())
            });

            let reg_b = registry.clone();
            tasks.spawn(async move {
                reg_b
                    .toggle_component(&admin(), "base", &format!("check{i}"), false)
                    .await?;
                Ok(())
            });

            let reg_c = registry.clone();
            tasks.spawn(async move {
                let hosts = reg_c.list_for(&admin()).await?;
                let mut names: Vec<_> = hosts.iter().map(|h| h.name.as_str()).collect();
                let total = names.len();
                names.sort_unstable();
                names.dedup();
                assert_eq!(names.len(), total);
                assert!(names.contains(&"base"));
                Ok(())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        // Every toggle survived: none was lost to a concurrent write.
        let base = registry.get_for(&admin(), "base").await.unwrap();
        assert_eq!(base.disabled_component_set().len(), 8);
        let stored = store.host_repo().find_by_name("base").await.unwrap().unwrap();
        assert_eq!(stored.disabled_components, base.disabled_components);

        assert_eq!(registry.list_for(&admin()).await.unwrap().len(), 9);
        assert_eq!(store.host_repo().list_all().await.unwrap().len(), 9);
    }

    #[test]
    fn host_name_validation() {
        assert!(validate_host_name("web-1.example.com").is_ok());
        assert!(validate_host_name("  ").is_err());
        assert!(validate_host_name("a/b").is_err());
        assert!(validate_host_name("a b").is_err());
    }
}
