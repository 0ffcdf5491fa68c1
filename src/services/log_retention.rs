//! Bounded, append-only host log store.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::config::FleetConfig;
use crate::db::{HostLogRow, Store};
use crate::models::{HostLog, NewHostLog};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Validation failed: {0}")]
    Invalid(String),

    #[error("Log eviction failed: {0}")]
    Eviction(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for LogError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub logs: Vec<HostLog>,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

pub struct LogRetentionManager {
    store: Store,
    max_rows: u64,
    batch_size: u64,
    /// Serializes count, evict and insert so the bound holds across
    /// concurrent appends.
    append_lock: Mutex<()>,
}

impl LogRetentionManager {
    #[must_use]
    pub fn new(store: Store, config: &FleetConfig) -> Self {
        Self::with_limits(
            store,
            config.log_retention_max_rows,
            config.log_eviction_batch_size,
        )
    }

    #[must_use]
    pub fn with_limits(store: Store, max_rows: u64, batch_size: u64) -> Self {
        Self {
            store,
            max_rows: max_rows.max(1),
            batch_size: batch_size.max(1),
            append_lock: Mutex::new(()),
        }
    }

    /// Appends one entry, first evicting the oldest rows while the table is
    /// at capacity. An eviction failure aborts the append.
    pub async fn append(&self, host_name: &str, entry: NewHostLog) -> Result<HostLog, LogError> {
        if entry.message.trim().is_empty() {
            return Err(LogError::Invalid("Log message cannot be empty".to_string()));
        }
        let metadata = entry
            .metadata
            .as_ref()
            .filter(|value| !value.is_null())
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| LogError::Invalid(format!("Invalid metadata: {e}")))?;

        let _guard = self.append_lock.lock().await;

        self.evict().await.map_err(|e| {
            error!(error = %e, "Log eviction failed");
            LogError::Eviction(e.to_string())
        })?;

        let log = self
            .store
            .host_log_repo()
            .insert(HostLogRow {
                host_name: host_name.to_string(),
                level: entry.level.trim().to_lowercase(),
                component: entry.component,
                message: entry.message,
                timestamp: entry.timestamp.unwrap_or_else(Utc::now),
                metadata,
                log_type: entry.log_type,
            })
            .await?;

        Ok(log)
    }

    async fn evict(&self) -> Result<u64, LogError> {
        let repo = self.store.host_log_repo();
        let mut count = repo.count().await?;
        let mut evicted = 0;

        while count >= self.max_rows {
            let ids = repo.oldest_ids(self.batch_size).await?;
            if ids.is_empty() {
                break;
            }
            let removed = repo.delete_ids(&ids).await?;
            if removed == 0 {
                break;
            }
            evicted += removed;
            count = count.saturating_sub(removed);
        }

        if evicted > 0 {
            metrics::counter!("fleet_logs_evicted_total").increment(evicted);
            debug!(evicted, remaining = count, "Evicted old host logs");
        }
        Ok(evicted)
    }

    /// Newest first. `page` is 1-based.
    pub async fn list(
        &self,
        host_name: &str,
        page: u64,
        page_size: u64,
        level: Option<String>,
    ) -> Result<LogPage, LogError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 500);
        let level = level
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty());

        let (logs, total_pages) = self
            .store
            .host_log_repo()
            .list_for_host(host_name, page, page_size, level)
            .await?;

        Ok(LogPage {
            logs,
            page,
            page_size,
            total_pages,
        })
    }

    pub async fn count(&self) -> Result<u64, LogError> {
        Ok(self.store.host_log_repo().count().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{EntityTrait, Set};

    fn entry(message: &str) -> NewHostLog {
        NewHostLog {
            level: "INFO".to_string(),
            component: "agent".to_string(),
            message: message.to_string(),
            timestamp: None,
            metadata: None,
            log_type: "monokit".to_string(),
        }
    }

    async fn seed(store: &Store, rows: usize) {
        let base = Utc::now() - Duration::days(1);
        let models: Vec<crate::entities::host_logs::ActiveModel> = (0..rows)
            .map(|i| crate::entities::host_logs::ActiveModel {
                host_name: Set("web1".to_string()),
                level: Set("info".to_string()),
                component: Set("agent".to_string()),
                message: Set(format!("seed {i}")),
                timestamp: Set(base + Duration::seconds(i64::try_from(i).unwrap())),
                metadata: Set(None),
                log_type: Set("monokit".to_string()),
                ..Default::default()
            })
            .collect();

        for chunk in models.chunks(500) {
            crate::entities::host_logs::Entity::insert_many(chunk.to_vec())
                .exec(&store.conn)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn append_below_capacity_keeps_everything() {
        let store = Store::in_memory().await.unwrap();
        let manager = LogRetentionManager::with_limits(store, 5, 2);
        for i in 0..4 {
            manager.append("web1", entry(&format!("m{i}"))).await.unwrap();
        }
        assert_eq!(manager.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn append_at_capacity_evicts_oldest_batch() {
        let store = Store::in_memory().await.unwrap();
        seed(&store, 5).await;
        let manager = LogRetentionManager::with_limits(store, 5, 2);

        let log = manager.append("web1", entry("newest")).await.unwrap();
        assert_eq!(log.level, "info");
        assert_eq!(manager.count().await.unwrap(), 4);

        let page = manager.list("web1", 1, 10, None).await.unwrap();
        let messages: Vec<_> = page.logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["newest", "seed 4", "seed 3", "seed 2"]);
    }

    #[tokio::test]
    async fn ten_thousand_rows_stay_bounded() {
        let store = Store::in_memory().await.unwrap();
        seed(&store, 10_000).await;
        let manager = LogRetentionManager::new(store, &FleetConfig::default());

        manager.append("web1", entry("overflow")).await.unwrap();
        let count = manager.count().await.unwrap();
        assert!(count <= 10_000);
        assert_eq!(count, 9_501);

        // Newest first, so the final page holds the oldest survivor.
        let last = manager.list("web1", 20, 500, None).await.unwrap();
        assert_eq!(last.total_pages, 20);
        assert_eq!(last.logs.len(), 1);
        assert_eq!(last.logs[0].message, "seed 500");
    }

    #[tokio::test]
    async fn list_filters_by_level() {
        let store = Store::in_memory().await.unwrap();
        let manager = LogRetentionManager::with_limits(store, 100, 10);
        manager.append("web1", entry("fine")).await.unwrap();
        let mut failure = entry("broken");
        failure.level = "error".to_string();
        failure.metadata = Some(serde_json::json!({"code": 3}));
        manager.append("web1", failure).await.unwrap();
        manager.append("web2", entry("elsewhere")).await.unwrap();

        let page = manager
            .list("web1", 1, 10, Some("ERROR".to_string()))
            .await
            .unwrap();
        assert_eq!(page.logs.len(), 1);
        assert_eq!(page.logs[0].message, "broken");
        assert_eq!(page.logs[0].metadata.as_deref(), Some("{\"code\":3}"));
    }

    #[tokio::test]
    async fn empty_messages_are_rejected() {
        let store = Store::in_memory().await.unwrap();
        let manager = LogRetentionManager::with_limits(store, 10, 2);
        assert!(matches!(
            manager.append("web1", entry("  ")).await,
            Err(LogError::Invalid(_))
        ));
    }
}
