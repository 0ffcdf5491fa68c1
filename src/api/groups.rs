use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::validation::validate_path_name;
use super::{ApiError, ApiResponse, AppState, MessageResponse, NameRequest};
use crate::domain::Principal;
use crate::services::GroupSummary;

/// GET /groups
pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<GroupSummary>>>, ApiError> {
    let groups = state.fleet_service().list_groups(&principal).await?;
    Ok(Json(ApiResponse::success(groups)))
}

/// POST /groups
pub async fn create_group(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<NameRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GroupSummary>>), ApiError> {
    let group = state
        .fleet_service()
        .create_group(&principal, payload.name.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(group))))
}

/// DELETE /groups/{name}
pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let name = validate_path_name(&name, "Group")?;
    state.fleet_service().delete_group(&principal, name).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Group {name} deleted"
    )))))
}

/// POST /groups/{name}/hosts/{host}
pub async fn add_host(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((group, host)): Path<(String, String)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    set_host(&state, &principal, &group, &host, true).await
}

/// DELETE /groups/{name}/hosts/{host}
pub async fn remove_host(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((group, host)): Path<(String, String)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    set_host(&state, &principal, &group, &host, false).await
}

async fn set_host(
    state: &AppState,
    principal: &Principal,
    group: &str,
    host: &str,
    member: bool,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let group = validate_path_name(group, "Group")?;
    let host = validate_path_name(host, "Host name")?;
    state
        .fleet_service()
        .set_host_membership(principal, group, host, member)
        .await?;

    let verb = if member { "added to" } else { "removed from" };
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Host {host} {verb} group {group}"
    )))))
}

/// POST /groups/{name}/users/{username}
pub async fn add_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((group, username)): Path<(String, String)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    set_user(&state, &principal, &group, &username, true).await
}

/// DELETE /groups/{name}/users/{username}
pub async fn remove_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((group, username)): Path<(String, String)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    set_user(&state, &principal, &group, &username, false).await
}

async fn set_user(
    state: &AppState,
    principal: &Principal,
    group: &str,
    username: &str,
    member: bool,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let group = validate_path_name(group, "Group")?;
    let username = validate_path_name(username, "Username")?;
    state
        .fleet_service()
        .set_user_membership(principal, group, username, member)
        .await?;

    let verb = if member { "added to" } else { "removed from" };
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "User {username} {verb} group {group}"
    )))))
}
