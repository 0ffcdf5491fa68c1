use crate::entities::{host_logs, prelude::*};
use crate::models::HostLog;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

pub struct HostLogRepository {
    conn: DatabaseConnection,
}

/// Column values for an insert; the id is assigned by the database.
#[derive(Debug, Clone)]
pub struct HostLogRow {
    pub host_name: String,
    pub level: String,
    pub component: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<String>,
    pub log_type: String,
}

impl HostLogRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn count(&self) -> Result<u64> {
        HostLogs::find()
            .count(&self.conn)
            .await
            .context("Failed to count host logs")
    }

    pub async fn insert(&self, row: HostLogRow) -> Result<HostLog> {
        let active = host_logs::ActiveModel {
            host_name: Set(row.host_name),
            level: Set(row.level),
            component: Set(row.component),
            message: Set(row.message),
            timestamp: Set(row.timestamp),
            metadata: Set(row.metadata),
            log_type: Set(row.log_type),
            ..Default::default()
        };

        let result = HostLogs::insert(active)
            .exec(&self.conn)
            .await
            .context("Failed to insert host log")?;

        let model = HostLogs::find_by_id(result.last_insert_id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Inserted host log vanished"))?;

        Ok(HostLog::from(model))
    }

    /// Ids of the `limit` oldest rows by `(timestamp, id)`.
    pub async fn oldest_ids(&self, limit: u64) -> Result<Vec<i64>> {
        let ids = HostLogs::find()
            .select_only()
            .column(host_logs::Column::Id)
            .order_by_asc(host_logs::Column::Timestamp)
            .order_by_asc(host_logs::Column::Id)
            .limit(limit)
            .into_tuple::<i64>()
            .all(&self.conn)
            .await
            .context("Failed to select oldest host logs")?;

        Ok(ids)
    }

    pub async fn delete_ids(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = HostLogs::delete_many()
            .filter(host_logs::Column::Id.is_in(ids.iter().copied()))
            .exec(&self.conn)
            .await
            .context("Failed to delete host logs")?;

        Ok(result.rows_affected)
    }

    /// Newest first. `page` is 1-based.
    pub async fn list_for_host(
        &self,
        host_name: &str,
        page: u64,
        page_size: u64,
        level_filter: Option<String>,
    ) -> Result<(Vec<HostLog>, u64)> {
        let mut query = HostLogs::find()
            .filter(host_logs::Column::HostName.eq(host_name))
            .order_by_desc(host_logs::Column::Timestamp)
            .order_by_desc(host_logs::Column::Id);

        if let Some(level) = level_filter {
            query = query.filter(host_logs::Column::Level.eq(level));
        }

        let paginator = query.paginate(&self.conn, page_size);
        let total_pages = paginator.num_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items.into_iter().map(HostLog::from).collect(), total_pages))
    }

    pub async fn delete_for_host(&self, host_name: &str) -> Result<u64> {
        let result = HostLogs::delete_many()
            .filter(host_logs::Column::HostName.eq(host_name))
            .exec(&self.conn)
            .await
            .context("Failed to delete host logs")?;
        Ok(result.rows_affected)
    }
}
