use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::validation::validate_path_name;
use super::{ApiError, ApiResponse, AppState, LogQuery};
use crate::domain::{Operation, Principal};
use crate::models::log::{HostLog, NewHostLog};
use crate::services::LogPage;

/// POST /hosts/{name}/logs
///
/// Written by the host itself or by an admin. Appending may evict the
/// oldest rows fleet-wide.
pub async fn append_log(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
    Json(entry): Json<NewHostLog>,
) -> Result<(StatusCode, Json<ApiResponse<HostLog>>), ApiError> {
    let name = validate_path_name(&name, "Host name")?;
    state
        .registry()
        .authorize(&principal, name, Operation::WriteLog)
        .await?;

    let log = state.log_retention().append(name, entry).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(log))))
}

/// GET /hosts/{name}/logs
///
/// Newest first, filtered by `level` when given.
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
    Query(query): Query<LogQuery>,
) -> Result<Json<ApiResponse<LogPage>>, ApiError> {
    let name = validate_path_name(&name, "Host name")?;
    state
        .registry()
        .authorize(&principal, name, Operation::ReadLogs)
        .await?;

    let page = state
        .log_retention()
        .list(name, query.page, query.page_size, query.level)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}
