use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::validation::validate_path_name;
use super::{ApiError, ApiResponse, AppState, MessageResponse, NameRequest};
use crate::domain::Principal;
use crate::services::InventorySummary;

/// GET /inventories
pub async fn list_inventories(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<InventorySummary>>>, ApiError> {
    let inventories = state.fleet_service().list_inventories(&principal).await?;
    Ok(Json(ApiResponse::success(inventories)))
}

/// POST /inventories
pub async fn create_inventory(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<NameRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InventorySummary>>), ApiError> {
    let inventory = state
        .fleet_service()
        .create_inventory(&principal, payload.name.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(inventory))))
}

/// DELETE /inventories/{name}
pub async fn delete_inventory(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let name = validate_path_name(&name, "Inventory")?;
    state.fleet_service().delete_inventory(&principal, name).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Inventory {name} deleted"
    )))))
}
