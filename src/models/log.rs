use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::host_logs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostLog {
    pub id: i64,
    pub host_name: String,
    pub level: String,
    pub component: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<String>,
    #[serde(rename = "type")]
    pub log_type: String,
}

impl From<host_logs::Model> for HostLog {
    fn from(model: host_logs::Model) -> Self {
        Self {
            id: model.id,
            host_name: model.host_name,
            level: model.level,
            component: model.component,
            message: model.message,
            timestamp: model.timestamp,
            metadata: model.metadata,
            log_type: model.log_type,
        }
    }
}

/// A log line submitted by an agent. `host_name` comes from the route, not
/// the body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewHostLog {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub component: String,
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    #[serde(rename = "type", default = "default_type")]
    pub log_type: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_type() -> String {
    "monokit".to_string()
}
