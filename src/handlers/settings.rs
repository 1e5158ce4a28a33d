use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::error::{ApiResponse, Result};
use crate::models::{CurrentUser, FolderSettings, StoredFolderSettings};
use crate::services::{FileService, SettingsService};
use crate::AppState;

/// Settings as the gallery viewer sees them
/// GET /api/v1/public/folders/:folder_id/settings
pub async fn get_public_settings(
    State(state): State<AppState>,
    Path(folder_id): Path<String>,
) -> Result<Json<ApiResponse<FolderSettings>>> {
    let settings = state.settings.get(&folder_id).await?;
    Ok(Json(ApiResponse::success(settings)))
}

/// GET /api/v1/folders/:id/settings
pub async fn get_settings(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(folder_id): Path<String>,
) -> Result<Json<ApiResponse<FolderSettings>>> {
    FileService::get_owned_folder(&state.db, &current_user.id, &folder_id).await?;
    let settings = state.settings.get(&folder_id).await?;
    Ok(Json(ApiResponse::success(settings)))
}

/// Partial update; fields left out keep their stored value
/// PUT /api/v1/folders/:id/settings
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(folder_id): Path<String>,
    Json(patch): Json<StoredFolderSettings>,
) -> Result<Json<ApiResponse<FolderSettings>>> {
    FileService::get_owned_folder(&state.db, &current_user.id, &folder_id).await?;
    let settings =
        SettingsService::update_settings(&state.db, &state.settings, &folder_id, patch).await?;
    Ok(Json(ApiResponse::success(settings)))
}
