use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub identity: IdentityConfig,

    pub fleet: FleetConfig,

    pub awx: AwxConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 4)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/fleetd.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 4,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9989,
            cors_allowed_origins: vec!["http://localhost:9989".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,

    /// Sliding session lifetime. Every authenticated request pushes the
    /// expiry to `now + session_ttl_minutes`.
    pub session_ttl_minutes: i64,

    pub bootstrap_admin_username: String,

    /// Password for the admin account created on first start. When unset a
    /// random one is generated and logged once.
    pub bootstrap_admin_password: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            session_ttl_minutes: 20,
            bootstrap_admin_username: "admin".to_string(),
            bootstrap_admin_password: None,
        }
    }
}

/// External identity provider (OIDC userinfo) integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub enabled: bool,

    pub userinfo_url: String,

    /// Claim holding the username. Dotted paths address nested objects.
    pub username_claim: String,

    /// Trusted claim holding role names, e.g. `realm_access.roles`.
    pub role_claim: String,

    /// Role value inside `role_claim` that maps to the admin role.
    pub admin_role: String,

    pub groups_claim: String,

    /// Keep accepting local session tokens while the IdP is enabled.
    pub allow_local_fallback: bool,

    pub request_timeout_seconds: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            userinfo_url: String::new(),
            username_claim: "preferred_username".to_string(),
            role_claim: "realm_access.roles".to_string(),
            admin_role: "admin".to_string(),
            groups_claim: "groups".to_string(),
            allow_local_fallback: true,
            request_timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// A host that has not reported for longer than this is offline.
    pub offline_after_seconds: i64,

    pub default_inventory: String,

    pub log_retention_max_rows: u64,

    pub log_eviction_batch_size: u64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            offline_after_seconds: 5 * 60,
            default_inventory: "default".to_string(),
            log_retention_max_rows: 10_000,
            log_eviction_batch_size: 500,
        }
    }
}

/// Remote job execution (AWX) integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwxConfig {
    pub enabled: bool,

    pub url: String,

    pub token: String,

    pub request_timeout_seconds: u64,
}

impl Default for AwxConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://localhost:8052".to_string(),
            token: String::new(),
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "fleetd".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    /// `FLEETD_CONFIG` names an explicit file, which must then exist.
    /// Otherwise the first existing file from the search path is used.
    pub fn load() -> Result<Self> {
        if let Ok(explicit) = std::env::var("FLEETD_CONFIG") {
            let path = PathBuf::from(explicit);
            info!("Loading config from FLEETD_CONFIG: {}", path.display());
            return Self::load_from_path(&path);
        }

        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("fleetd").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".fleetd").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.identity.enabled {
            url::Url::parse(&self.identity.userinfo_url)
                .context("identity.userinfo_url must be a valid URL when identity is enabled")?;
            if self.identity.request_timeout_seconds == 0 {
                anyhow::bail!("identity.request_timeout_seconds must be > 0");
            }
        }

        if self.awx.enabled {
            url::Url::parse(&self.awx.url)
                .context("awx.url must be a valid URL when AWX is enabled")?;
            if self.awx.request_timeout_seconds == 0 {
                anyhow::bail!("awx.request_timeout_seconds must be > 0");
            }
        }

        if self.security.session_ttl_minutes <= 0 {
            anyhow::bail!("security.session_ttl_minutes must be > 0");
        }

        if self.fleet.offline_after_seconds <= 0 {
            anyhow::bail!("fleet.offline_after_seconds must be > 0");
        }

        if self.fleet.log_retention_max_rows == 0 || self.fleet.log_eviction_batch_size == 0 {
            anyhow::bail!("fleet log retention limits must be > 0");
        }

        if self.fleet.default_inventory.trim().is_empty() {
            anyhow::bail!("fleet.default_inventory cannot be empty");
        }

        Ok(())
    }

    #[must_use]
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.security.session_ttl_minutes)
    }

    #[must_use]
    pub fn offline_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.fleet.offline_after_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.security.session_ttl_minutes, 20);
        assert_eq!(config.fleet.offline_after_seconds, 300);
        assert_eq!(config.fleet.log_retention_max_rows, 10_000);
        assert_eq!(config.fleet.log_eviction_batch_size, 500);
        assert_eq!(config.fleet.default_inventory, "default");
        assert!(!config.identity.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[identity]"));
        assert!(toml_str.contains("[fleet]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [identity]
            enabled = true
            userinfo_url = "https://sso.example.com/realms/ops/protocol/openid-connect/userinfo"
            allow_local_fallback = false
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert!(config.identity.enabled);
        assert!(!config.identity.allow_local_fallback);
        assert_eq!(config.identity.role_claim, "realm_access.roles");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_identity_url() {
        let mut config = Config::default();
        config.identity.enabled = true;
        config.identity.userinfo_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
