//! Read and write scoping of host data per principal.
//!
//! Admins see everything. Ordinary users are confined to their inventories,
//! and for mutating operations additionally to hosts sharing a group. Host
//! principals only ever reach their own host.

use serde::Serialize;
use thiserror::Error;

use crate::domain::{Operation, Principal, UserPrincipal, groups_match};
use crate::models::Host;

/// Which boundary a visibility check applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Inventory,
    InventoryAndGroups,
}

impl Scope {
    #[must_use]
    pub const fn for_operation(operation: Operation) -> Self {
        if operation.is_group_scoped() {
            Self::InventoryAndGroups
        } else {
            Self::Inventory
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    /// Out of scope. Reported as missing so tenants cannot probe each other.
    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,
}

/// Aggregate row returned by inventory listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventorySummary {
    pub name: String,
    pub host_count: u64,
}

#[must_use]
pub fn user_can_see(user: &UserPrincipal, host: &Host, scope: Scope) -> bool {
    if user.is_admin() {
        return true;
    }

    if !user.inventories.contains(host.inventory.trim()) {
        return false;
    }

    match scope {
        Scope::Inventory => true,
        Scope::InventoryAndGroups => groups_match(&user.groups, &host.group_set()),
    }
}

/// The subset of `hosts` the principal may see. Host principals never list.
#[must_use]
pub fn filter_hosts(principal: &Principal, hosts: Vec<Host>, scope: Scope) -> Vec<Host> {
    match principal {
        Principal::Host { .. } => Vec::new(),
        Principal::User(user) if user.is_admin() => hosts,
        Principal::User(user) => hosts
            .into_iter()
            .filter(|host| user_can_see(user, host, scope))
            .collect(),
    }
}

pub fn authorize(
    principal: &Principal,
    host: &Host,
    operation: Operation,
) -> Result<(), AccessDenied> {
    match principal {
        Principal::Host { host_name } => {
            if host_name == &host.name && operation.is_host_self_service() {
                Ok(())
            } else {
                Err(AccessDenied::Forbidden)
            }
        }
        Principal::User(user) if user.is_admin() => Ok(()),
        Principal::User(user) => {
            if !user_can_see(user, host, Scope::for_operation(operation)) {
                return Err(AccessDenied::NotFound);
            }
            if operation.is_operator_allowed() {
                Ok(())
            } else {
                Err(AccessDenied::Forbidden)
            }
        }
    }
}

pub fn require_admin(principal: &Principal) -> Result<&UserPrincipal, AccessDenied> {
    match principal.as_user() {
        Some(user) if user.is_admin() => Ok(user),
        _ => Err(AccessDenied::Forbidden),
    }
}

pub fn require_user(principal: &Principal) -> Result<&UserPrincipal, AccessDenied> {
    principal.as_user().ok_or(AccessDenied::Forbidden)
}

/// Inventory aggregates restricted to what the principal may see.
pub fn filter_inventories(
    principal: &Principal,
    summaries: Vec<InventorySummary>,
) -> Result<Vec<InventorySummary>, AccessDenied> {
    let user = require_user(principal)?;
    if user.is_admin() {
        return Ok(summaries);
    }

    Ok(summaries
        .into_iter()
        .filter(|summary| user.inventories.contains(&summary.name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NIL, Role};
    use chrono::Utc;

    fn host(name: &str, inventory: &str, groups: &str) -> Host {
        let now = Utc::now();
        Host {
            id: 1,
            name: name.to_string(),
            ip_address: String::new(),
            cpu_cores: 1,
            ram: String::new(),
            os: String::new(),
            monokit_version: String::new(),
            disabled_components: NIL.to_string(),
            installed_components: NIL.to_string(),
            status: String::new(),
            groups: groups.to_string(),
            inventory: inventory.to_string(),
            up_for_deletion: false,
            wants_update_to: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn user(groups: &str, inventories: &str) -> Principal {
        Principal::User(UserPrincipal::new(7, "bob", Role::User, groups, inventories))
    }

    fn admin() -> Principal {
        Principal::User(UserPrincipal::new(1, "root", Role::Admin, NIL, NIL))
    }

    #[test]
    fn admin_sees_everything() {
        let hosts = vec![host("a", "prod", "ops"), host("b", "lab", NIL)];
        let visible = filter_hosts(&admin(), hosts.clone(), Scope::InventoryAndGroups);
        assert_eq!(visible, hosts);
    }

    #[test]
    fn users_never_see_other_inventories() {
        let hosts = vec![
            host("a", "prod", "ops"),
            host("b", "lab", "ops"),
            host("c", "staging", NIL),
        ];
        let principal = user("ops", "prod, staging");

        let names: Vec<_> = filter_hosts(&principal, hosts.clone(), Scope::Inventory)
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, vec!["a", "c"]);

        let names: Vec<_> = filter_hosts(&principal, hosts, Scope::InventoryAndGroups)
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn nil_groups_match_symmetrically() {
        let ungrouped_user = user(NIL, "prod");
        let grouped_user = user("ops", "prod");
        let ungrouped_host = host("a", "prod", NIL);
        let blank_host = host("b", "prod", "");
        let grouped_host = host("c", "prod", "ops");

        let check = |p: &Principal, h: &Host| {
            authorize(p, h, Operation::ToggleComponent).is_ok()
        };

        assert!(check(&ungrouped_user, &ungrouped_host));
        assert!(check(&ungrouped_user, &blank_host));
        assert!(!check(&ungrouped_user, &grouped_host));
        assert!(!check(&grouped_user, &ungrouped_host));
        assert!(check(&grouped_user, &grouped_host));
    }

    #[test]
    fn out_of_scope_is_not_found_and_admin_only_is_forbidden() {
        let principal = user("ops", "prod");
        assert_eq!(
            authorize(&principal, &host("x", "lab", "ops"), Operation::View),
            Err(AccessDenied::NotFound)
        );
        assert_eq!(
            authorize(&principal, &host("x", "prod", "ops"), Operation::Delete),
            Err(AccessDenied::Forbidden)
        );
        assert!(authorize(&principal, &host("x", "prod", "dev"), Operation::View).is_ok());
    }

    #[test]
    fn host_principal_is_confined_to_itself() {
        let principal = Principal::Host {
            host_name: "web1".to_string(),
        };
        let own = host("web1", "prod", NIL);
        let other = host("web2", "prod", NIL);

        assert!(authorize(&principal, &own, Operation::SelfReport).is_ok());
        assert!(authorize(&principal, &own, Operation::WriteLog).is_ok());
        assert!(authorize(&principal, &own, Operation::ReadConfig).is_ok());
        assert_eq!(
            authorize(&principal, &own, Operation::View),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(
            authorize(&principal, &other, Operation::WriteLog),
            Err(AccessDenied::Forbidden)
        );
        assert!(filter_hosts(&principal, vec![own], Scope::Inventory).is_empty());
    }

    #[test]
    fn inventory_listing_is_restricted_for_users() {
        let summaries = vec![
            InventorySummary {
                name: "prod".to_string(),
                host_count: 3,
            },
            InventorySummary {
                name: "lab".to_string(),
                host_count: 1,
            },
        ];

        let visible = filter_inventories(&user(NIL, "prod"), summaries.clone()).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "prod");

        assert_eq!(filter_inventories(&admin(), summaries.clone()).unwrap().len(), 2);

        let host = Principal::Host {
            host_name: "web1".to_string(),
        };
        assert_eq!(
            filter_inventories(&host, summaries),
            Err(AccessDenied::Forbidden)
        );
    }
}
