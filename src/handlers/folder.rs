use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::error::Result;
use crate::folders::FolderService;
use crate::middleware::CurrentUser;
use crate::models::{CreateFolderRequest, Folder, RenameFolderRequest};
use crate::AppState;

/// List folders for the current user
/// GET /api/folders
pub async fn list_folders(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<Vec<Folder>>> {
    let folders = FolderService::list_by_owner(&state.db, &current_user.id).await?;
    Ok(Json(folders))
}

/// Create a folder
/// POST /api/folders
pub async fn create_folder(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<CreateFolderRequest>,
) -> Result<Json<Folder>> {
    let folder = FolderService::create(&state.db, &current_user.id, req).await?;
    Ok(Json(folder))
}

/// Rename a folder
/// PATCH /api/folders/:id
pub async fn rename_folder(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<RenameFolderRequest>,
) -> Result<Json<Folder>> {
    let folder = FolderService::rename(&state.db, &current_user.id, &id, req.name).await?;
    Ok(Json(folder))
}

/// Delete a folder subtree; file records keep existing with their folder
/// reference cleared
/// DELETE /api/folders/:id
pub async fn delete_folder(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    FolderService::delete(&state.db, &current_user.id, &id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
