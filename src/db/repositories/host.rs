use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
    sea_query::{Expr, SimpleExpr},
};
use std::collections::HashMap;

use crate::domain::NIL;
use crate::entities::{host_groups, host_keys, hosts};
use crate::models::{Host, HostReport, HostStatus};

pub struct HostRepository {
    conn: DatabaseConnection,
}

#[derive(Debug, FromQueryResult)]
struct InventoryCountRow {
    inventory: String,
    host_count: i64,
}

impl HostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_all(&self) -> Result<Vec<Host>> {
        let rows = hosts::Entity::find()
            .order_by_asc(hosts::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list hosts")?;

        Ok(rows.into_iter().map(Host::from).collect())
    }

    /// Lowest-id row with this name.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Host>> {
        let row = hosts::Entity::find()
            .filter(hosts::Column::Name.eq(name))
            .order_by_asc(hosts::Column::Id)
            .one(&self.conn)
            .await
            .context("Failed to query host by name")?;

        Ok(row.map(Host::from))
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Host>> {
        let row = hosts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query host by id")?;

        Ok(row.map(Host::from))
    }

    pub async fn insert(
        &self,
        report: &HostReport,
        inventory: &str,
        now: DateTime<Utc>,
    ) -> Result<Host> {
        let active = hosts::ActiveModel {
            name: Set(report.name.trim().to_string()),
            ip_address: Set(report.ip_address.clone()),
            cpu_cores: Set(report.cpu_cores),
            ram: Set(report.ram.clone()),
            os: Set(report.os.clone()),
            monokit_version: Set(report.monokit_version.clone()),
            disabled_components: Set(NIL.to_string()),
            installed_components: Set(report.installed_components_or_nil()),
            status: Set(HostStatus::Online.as_str().to_string()),
            groups: Set(NIL.to_string()),
            inventory: Set(inventory.to_string()),
            up_for_deletion: Set(false),
            wants_update_to: Set(String::new()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .with_context(|| format!("Failed to insert host {}", report.name))?;

        Ok(Host::from(model))
    }

    /// Overwrites the agent-owned columns of an existing row.
    pub async fn apply_report(
        &self,
        id: i32,
        report: &HostReport,
        now: DateTime<Utc>,
    ) -> Result<Option<Host>> {
        let Some(existing) = hosts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query host for report")?
        else {
            return Ok(None);
        };

        let mut active: hosts::ActiveModel = existing.into();
        active.ip_address = Set(report.ip_address.clone());
        active.cpu_cores = Set(report.cpu_cores);
        active.ram = Set(report.ram.clone());
        active.os = Set(report.os.clone());
        active.monokit_version = Set(report.monokit_version.clone());
        active.installed_components = Set(report.installed_components_or_nil());
        active.updated_at = Set(now);

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to apply host report")?;

        Ok(Some(Host::from(model)))
    }

    async fn set_column(
        &self,
        id: i32,
        column: hosts::Column,
        value: SimpleExpr,
    ) -> Result<Option<Host>> {
        let result = hosts::Entity::update_many()
            .col_expr(column, value)
            .filter(hosts::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .with_context(|| format!("Failed to update host {id}"))?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    pub async fn set_disabled_components(&self, id: i32, value: &str) -> Result<Option<Host>> {
        self.set_column(
            id,
            hosts::Column::DisabledComponents,
            Expr::value(value.to_string()),
        )
        .await
    }

    pub async fn set_wants_update_to(&self, id: i32, version: &str) -> Result<Option<Host>> {
        self.set_column(
            id,
            hosts::Column::WantsUpdateTo,
            Expr::value(version.to_string()),
        )
        .await
    }

    pub async fn set_up_for_deletion(&self, id: i32, flag: bool) -> Result<Option<Host>> {
        self.set_column(id, hosts::Column::UpForDeletion, Expr::value(flag))
            .await
    }

    pub async fn set_inventory(&self, id: i32, inventory: &str) -> Result<Option<Host>> {
        self.set_column(
            id,
            hosts::Column::Inventory,
            Expr::value(inventory.to_string()),
        )
        .await
    }

    pub async fn set_groups(&self, id: i32, groups: &str) -> Result<Option<Host>> {
        self.set_column(id, hosts::Column::Groups, Expr::value(groups.to_string()))
            .await
    }

    pub async fn set_status(&self, id: i32, status: &str) -> Result<Option<Host>> {
        self.set_column(id, hosts::Column::Status, Expr::value(status.to_string()))
            .await
    }

    pub async fn rename(&self, id: i32, new_name: &str) -> Result<Option<Host>> {
        self.set_column(id, hosts::Column::Name, Expr::value(new_name.to_string()))
            .await
    }

    /// Hard delete: group links, the host key and the row, in one transaction.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let txn = self.conn.begin().await?;

        let Some(host) = hosts::Entity::find_by_id(id)
            .one(&txn)
            .await
            .context("Failed to query host for deletion")?
        else {
            txn.rollback().await?;
            return Ok(false);
        };

        host_groups::Entity::delete_many()
            .filter(host_groups::Column::HostId.eq(id))
            .exec(&txn)
            .await
            .context("Failed to delete host group links")?;

        // Only the surviving row of a name owns its key.
        let same_name_rows = hosts::Entity::find()
            .filter(hosts::Column::Name.eq(host.name.as_str()))
            .count(&txn)
            .await?;
        if same_name_rows <= 1 {
            host_keys::Entity::delete_many()
                .filter(host_keys::Column::HostName.eq(host.name.as_str()))
                .exec(&txn)
                .await
                .context("Failed to delete host key")?;
        }

        let result = hosts::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .context("Failed to delete host")?;

        txn.commit().await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn count_by_inventory(&self) -> Result<HashMap<String, u64>> {
        let rows = hosts::Entity::find()
            .select_only()
            .column(hosts::Column::Inventory)
            .column_as(Expr::col(hosts::Column::Id).count(), "host_count")
            .group_by(hosts::Column::Inventory)
            .into_model::<InventoryCountRow>()
            .all(&self.conn)
            .await
            .context("Failed to count hosts per inventory")?;

        Ok(rows
            .into_iter()
            .map(|row| (row.inventory, u64::try_from(row.host_count).unwrap_or(0)))
            .collect())
    }

    /// Enforces unique host names from here on. Must run after duplicate
    /// repair, otherwise index creation fails.
    pub async fn ensure_unique_name_index(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .execute(Statement::from_string(
                backend,
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_hosts_name_unique ON hosts (name)"
                    .to_string(),
            ))
            .await
            .context("Failed to create unique host name index")?;
        Ok(())
    }
}
