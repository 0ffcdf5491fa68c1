//! Admin-only user management.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::validation::validate_path_name;
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::domain::Principal;
use crate::services::access;
use crate::services::auth_service::{CreateUser, UpdateUser, UserInfo};

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<UserInfo>>>, ApiError> {
    access::require_admin(&principal)?;
    let users = state.auth_service().list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

/// POST /admin/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateUser>,
) -> Result<(StatusCode, Json<ApiResponse<UserInfo>>), ApiError> {
    access::require_admin(&principal)?;
    let user = state.auth_service().create_user(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

/// PUT /admin/users/{username}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(username): Path<String>,
    Json(payload): Json<UpdateUser>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    access::require_admin(&principal)?;
    let username = validate_path_name(&username, "Username")?;
    let user = state.auth_service().update_user(username, payload).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// DELETE /admin/users/{username}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(username): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    access::require_admin(&principal)?;
    let username = validate_path_name(&username, "Username")?;
    state.auth_service().delete_user(username).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "User {username} deleted"
    )))))
}
