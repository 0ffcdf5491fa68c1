use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::clients::awx::AwxClient;
use crate::clients::oidc::OidcUserInfoClient;
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, FleetService, HostRegistry, IdentityProvider, JobRunner, JobService,
    LogRetentionManager, PrincipalResolver, SeaOrmAuthService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub resolver: Arc<PrincipalResolver>,

    pub registry: Arc<HostRegistry>,

    pub log_retention: Arc<LogRetentionManager>,

    pub auth_service: Arc<dyn AuthService>,

    pub fleet_service: Arc<FleetService>,

    pub job_service: Arc<JobService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Self::with_store(config, store).await
    }

    /// Wires every service around an already-migrated store and runs the
    /// startup reconciliation.
    pub async fn with_store(config: Config, store: Store) -> anyhow::Result<Self> {
        let registry = Arc::new(HostRegistry::new(store.clone(), &config));
        registry.initialize().await?;

        let identity = if config.identity.enabled {
            info!(url = %config.identity.userinfo_url, "External identity provider enabled");
            Some(Arc::new(OidcUserInfoClient::new(&config.identity)?) as Arc<dyn IdentityProvider>)
        } else {
            None
        };

        let resolver = Arc::new(PrincipalResolver::new(
            Arc::new(store.clone()),
            identity,
            &config,
        ));

        let log_retention = Arc::new(LogRetentionManager::new(store.clone(), &config.fleet));

        let auth_service = Arc::new(SeaOrmAuthService::new(store.clone(), config.clone()))
            as Arc<dyn AuthService>;
        let username = &config.security.bootstrap_admin_username;
        if let Some(password) = bootstrap_admin(auth_service.as_ref(), username).await? {
            // Shown once on the console only; log sinks may be remote.
            eprintln!("fleetd: generated password for bootstrap admin '{username}': {password}");
        }

        let fleet_service = Arc::new(FleetService::new(
            store.clone(),
            registry.clone(),
            config.fleet.default_inventory.clone(),
        ));

        let runner = if config.awx.enabled {
            Some(Arc::new(AwxClient::new(&config.awx)?) as Arc<dyn JobRunner>)
        } else {
            None
        };
        let job_service = Arc::new(JobService::new(runner, registry.clone()));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            resolver,
            registry,
            log_retention,
            auth_service,
            fleet_service,
            job_service,
        })
    }
}

/// Creates the first admin when the user table is empty. A generated
/// password is returned to the caller and never passes through tracing.
async fn bootstrap_admin(
    auth_service: &dyn AuthService,
    username: &str,
) -> anyhow::Result<Option<String>> {
    let generated = auth_service.ensure_bootstrap_admin().await?;
    if generated.is_some() {
        warn!(
            username = %username,
            "Generated bootstrap admin password; change it after first login"
        );
    }
    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn generated_admin_password_is_returned_but_not_logged() {
        let mut config = Config::default();
        config.security.argon2_memory_cost_kib = 1024;
        config.security.argon2_time_cost = 1;
        config.security.bootstrap_admin_password = None;

        let store = Store::in_memory().await.unwrap();
        let auth_service = SeaOrmAuthService::new(store, config.clone());

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let password = bootstrap_admin(&auth_service, "admin")
            .await
            .unwrap()
            .expect("a password is generated for an empty user table");
        assert!(!password.is_empty());

        let output = logs.text();
        assert!(output.contains("Generated bootstrap admin password"));
        assert!(!output.contains(&password));

        let login = auth_service.login("admin", &password).await.unwrap();
        assert!(!logs.text().contains(&password));
        assert_eq!(login.username, "admin");

        // A second start finds the admin and generates nothing.
        assert_eq!(bootstrap_admin(&auth_service, "admin").await.unwrap(), None);
    }
}
