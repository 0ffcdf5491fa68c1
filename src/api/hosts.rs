use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;

use super::auth::authorization_header;
use super::validation::{validate_component, validate_path_name};
use super::{
    ApiError, ApiResponse, AppState, DeletionRequest, InventoryRequest, MessageResponse,
    RegistrationResponse, VersionRequest,
};
use crate::domain::Principal;
use crate::models::host::{Host, HostReport};
use crate::services::host_registry::{HostConfig, RenamedHost};
use crate::services::{RegistrationOutcome, access};

/// POST /hosts
///
/// Agent self-report. Creates the host on first contact (201, with the new
/// host key), otherwise refreshes it (200) after checking the presented key.
pub async fn register_host(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(report): Json<HostReport>,
) -> Result<(StatusCode, Json<ApiResponse<RegistrationResponse>>), ApiError> {
    let auth = authorization_header(&headers);

    let outcome = state.registry().register(report, auth.as_deref()).await?;

    Ok(match outcome {
        RegistrationOutcome::Created { host, api_key } => (
            StatusCode::CREATED,
            Json(ApiResponse::success(RegistrationResponse {
                host,
                api_key: Some(api_key),
            })),
        ),
        RegistrationOutcome::Updated { host } => (
            StatusCode::OK,
            Json(ApiResponse::success(RegistrationResponse {
                host,
                api_key: None,
            })),
        ),
    })
}

/// GET /hosts
pub async fn list_hosts(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<Host>>>, ApiError> {
    let hosts = state.registry().list_for(&principal).await?;
    Ok(Json(ApiResponse::success(hosts)))
}

/// GET /hosts/{name}
pub async fn get_host(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<Host>>, ApiError> {
    let name = validate_path_name(&name, "Host name")?;
    let host = state.registry().get_for(&principal, name).await?;
    Ok(Json(ApiResponse::success(host)))
}

/// DELETE /hosts/{name}
pub async fn delete_host(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let name = validate_path_name(&name, "Host name")?;
    state.registry().delete_host(&principal, name).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Host {name} deleted"
    )))))
}

/// GET /hosts/{name}/config
pub async fn get_host_config(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<HostConfig>>, ApiError> {
    let name = validate_path_name(&name, "Host name")?;
    let config = state.registry().config_for(&principal, name).await?;
    Ok(Json(ApiResponse::success(config)))
}

/// POST /hosts/{name}/components/{component}/enable
pub async fn enable_component(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((name, component)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Host>>, ApiError> {
    toggle(&state, &principal, &name, &component, true).await
}

/// POST /hosts/{name}/components/{component}/disable
pub async fn disable_component(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((name, component)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Host>>, ApiError> {
    toggle(&state, &principal, &name, &component, false).await
}

async fn toggle(
    state: &AppState,
    principal: &Principal,
    name: &str,
    component: &str,
    enabled: bool,
) -> Result<Json<ApiResponse<Host>>, ApiError> {
    let name = validate_path_name(name, "Host name")?;
    let component = validate_component(component)?;
    let host = state
        .registry()
        .toggle_component(principal, name, component, enabled)
        .await?;
    Ok(Json(ApiResponse::success(host)))
}

/// PUT /hosts/{name}/version
pub async fn set_version(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
    Json(payload): Json<VersionRequest>,
) -> Result<Json<ApiResponse<Host>>, ApiError> {
    let name = validate_path_name(&name, "Host name")?;
    let host = state
        .registry()
        .set_version(&principal, name, &payload.version)
        .await?;
    Ok(Json(ApiResponse::success(host)))
}

/// PUT /hosts/{name}/deletion
pub async fn schedule_deletion(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
    Json(payload): Json<DeletionRequest>,
) -> Result<Json<ApiResponse<Host>>, ApiError> {
    let name = validate_path_name(&name, "Host name")?;
    let host = state
        .registry()
        .schedule_deletion(&principal, name, payload.up_for_deletion)
        .await?;
    Ok(Json(ApiResponse::success(host)))
}

/// PUT /hosts/{name}/inventory
pub async fn move_inventory(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
    Json(payload): Json<InventoryRequest>,
) -> Result<Json<ApiResponse<Host>>, ApiError> {
    let name = validate_path_name(&name, "Host name")?;
    let host = state
        .registry()
        .move_inventory(&principal, name, &payload.inventory)
        .await?;
    Ok(Json(ApiResponse::success(host)))
}

/// POST /admin/hosts/repair
pub async fn repair_duplicates(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<RenamedHost>>>, ApiError> {
    access::require_admin(&principal)?;
    let renamed = state.registry().repair_duplicate_names().await?;
    Ok(Json(ApiResponse::success(renamed)))
}
