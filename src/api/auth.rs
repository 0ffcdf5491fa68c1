use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::domain::Principal;
use crate::services::access;
use crate::services::auth_service::{LoginResult, UpdateSelf, UserInfo};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the `Authorization` header into a [`Principal`] and hands it to
/// handlers as a request extension.
///
/// The header may carry a host key, an IdP bearer token or a session token,
/// each optionally `Bearer`-prefixed.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let raw = authorization_header(request.headers()).unwrap_or_default();

    let principal = state.resolver().resolve(&raw).await?;
    tracing::Span::current().record("principal", principal.label());

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

pub fn authorization_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResult>>, ApiError> {
    if payload.username.trim().is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let result = state
        .auth_service()
        .login(payload.username.trim(), &payload.password)
        .await?;

    Ok(Json(ApiResponse::success(result)))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    access::require_user(&principal)?;
    let raw = authorization_header(&headers).unwrap_or_default();

    state.auth_service().logout(&raw).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Logged out",
    ))))
}

/// GET /auth/me
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = access::require_user(&principal)?;
    let info = state.auth_service().me(user).await?;
    Ok(Json(ApiResponse::success(info)))
}

/// PUT /auth/me
/// Email and password only; changing the password needs the current one.
pub async fn update_current_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<UpdateSelf>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = access::require_user(&principal)?;
    let info = state.auth_service().update_me(user, payload).await?;
    Ok(Json(ApiResponse::success(info)))
}
