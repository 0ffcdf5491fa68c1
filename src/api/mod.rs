use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::services::{
    AuthService, FleetService, HostRegistry, JobService, LogRetentionManager, PrincipalResolver,
};
use crate::state::SharedState;

pub mod auth;
mod error;
mod groups;
mod hosts;
mod inventories;
mod jobs;
mod logs;
mod observability;
mod system;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<PrincipalResolver> {
        &self.shared.resolver
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<HostRegistry> {
        &self.shared.registry
    }

    #[must_use]
    pub fn log_retention(&self) -> &Arc<LogRetentionManager> {
        &self.shared.log_retention
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn fleet_service(&self) -> &Arc<FleetService> {
        &self.shared.fleet_service
    }

    #[must_use]
    pub fn job_service(&self) -> &Arc<JobService> {
        &self.shared.job_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (cors_origins, metrics_enabled) = {
        let config = state.config().read().await;
        (
            config.server.cors_allowed_origins.clone(),
            config.observability.metrics_enabled,
        )
    };

    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/health", get(system::health))
        .route("/auth/login", post(auth::login))
        .route("/hosts", post(hosts::register_host))
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    let mut app = Router::new().nest("/api/v1", api_router);

    if metrics_enabled {
        app = app.route(
            "/metrics",
            get(observability::get_metrics).with_state(state),
        );
    }

    app.layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(TraceLayer::new_for_http())
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route(
            "/auth/me",
            get(auth::get_current_user).put(auth::update_current_user),
        )
        .route("/hosts", get(hosts::list_hosts))
        .route(
            "/hosts/{name}",
            get(hosts::get_host).delete(hosts::delete_host),
        )
        .route("/hosts/{name}/config", get(hosts::get_host_config))
        .route(
            "/hosts/{name}/components/{component}/enable",
            post(hosts::enable_component),
        )
        .route(
            "/hosts/{name}/components/{component}/disable",
            post(hosts::disable_component),
        )
        .route("/hosts/{name}/version", put(hosts::set_version))
        .route("/hosts/{name}/deletion", put(hosts::schedule_deletion))
        .route("/hosts/{name}/inventory", put(hosts::move_inventory))
        .route(
            "/hosts/{name}/logs",
            get(logs::list_logs).post(logs::append_log),
        )
        .route(
            "/inventories",
            get(inventories::list_inventories).post(inventories::create_inventory),
        )
        .route(
            "/inventories/{name}",
            delete(inventories::delete_inventory),
        )
        .route(
            "/groups",
            get(groups::list_groups).post(groups::create_group),
        )
        .route("/groups/{name}", delete(groups::delete_group))
        .route(
            "/groups/{name}/hosts/{host}",
            post(groups::add_host).delete(groups::remove_host),
        )
        .route(
            "/groups/{name}/users/{username}",
            post(groups::add_user).delete(groups::remove_user),
        )
        .route(
            "/admin/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/admin/users/{username}",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/admin/hosts/repair", post(hosts::repair_duplicates))
        .route("/jobs", post(jobs::run_job))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
