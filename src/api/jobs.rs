use axum::{Extension, Json, extract::State};
use std::sync::Arc;

use super::validation::{validate_path_name, validate_template_id};
use super::{ApiError, ApiResponse, AppState};
use crate::domain::Principal;
use crate::services::{JobLaunch, JobRequest};

/// POST /jobs
///
/// Launches a job template limited to one host the caller may operate on.
pub async fn run_job(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<JobRequest>,
) -> Result<Json<ApiResponse<JobLaunch>>, ApiError> {
    validate_template_id(payload.template_id)?;
    validate_path_name(&payload.host, "Host name")?;

    let launch = state.job_service().run(&principal, payload).await?;
    Ok(Json(ApiResponse::success(launch)))
}
