use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{CurrentUser, FileRecord, ResolvedFile};
use crate::services::FileService;
use crate::AppState;

/// List files in an owned folder, newest first
/// GET /api/v1/folders/:id/files
pub async fn list_files(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(folder_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<FileRecord>>>> {
    FileService::get_owned_folder(&state.db, &current_user.id, &folder_id).await?;
    let files = FileService::list_folder_files(&state.db, &folder_id).await?;
    Ok(Json(ApiResponse::success(files)))
}

/// Look up a file by any of the names it has been known under
/// GET /api/v1/folders/:id/files/:name
pub async fn resolve_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path((folder_id, name)): Path<(String, String)>,
) -> Result<Json<ApiResponse<ResolvedFile>>> {
    FileService::get_owned_folder(&state.db, &current_user.id, &folder_id).await?;

    let resolved =
        FileService::resolve_file(&state.db, &folder_id, &name, state.config.share.fuzzy_window)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    Ok(Json(ApiResponse::success(resolved)))
}
