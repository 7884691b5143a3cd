use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::catalog::{FileCatalog, DEFAULT_RECENT_LIMIT};
use crate::error::{AppError, Result};
use crate::ingest::IngestionPipeline;
use crate::middleware::CurrentUser;
use crate::models::{DuplicateCheckResponse, FileFilters, FileResponse, RecentQuery};
use crate::AppState;

/// An upload spooled from the request body to a local temp file
struct SpooledUpload {
    path: PathBuf,
    file_name: String,
    content_type: Option<String>,
    folder_id: Option<String>,
}

impl SpooledUpload {
    async fn cleanup(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::error!("Failed to remove temp file {:?}: {}", self.path, e);
        }
    }
}

/// Spool the multipart `file` field to a temp file so it can be hashed and
/// persisted without holding the upload in memory
async fn spool_multipart(mut multipart: Multipart) -> Result<SpooledUpload> {
    let mut temp_file_path: Option<PathBuf> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut folder_id: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to process multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                content_type = field.content_type().map(|s| s.to_string());

                let temp_path =
                    std::env::temp_dir().join(format!("coffer_upload_{}", Uuid::new_v4()));

                let mut file = tokio::fs::File::create(&temp_path)
                    .await
                    .map_err(|e| AppError::Storage(format!("Failed to create temp file: {}", e)))?;

                let spool_result: Result<()> = async {
                    while let Some(chunk) = field.chunk().await.map_err(|e| {
                        AppError::Ingestion(format!("Failed to read upload stream: {}", e))
                    })? {
                        file.write_all(&chunk).await.map_err(|e| {
                            AppError::Storage(format!("Failed to write temp file: {}", e))
                        })?;
                    }
                    file.flush().await.map_err(|e| {
                        AppError::Storage(format!("Failed to flush temp file: {}", e))
                    })?;
                    Ok(())
                }
                .await;

                if let Err(e) = spool_result {
                    let _ = tokio::fs::remove_file(&temp_path).await;
                    return Err(e);
                }

                temp_file_path = Some(temp_path);
            }
            "folder_id" => {
                let text = field.text().await.unwrap_or_default();
                if !text.is_empty() {
                    folder_id = Some(text);
                }
            }
            _ => {}
        }
    }

    let path =
        temp_file_path.ok_or_else(|| AppError::Validation("No file provided".to_string()))?;
    let file_name = match file_name {
        Some(name) => name,
        None => {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(AppError::Validation("No file name provided".to_string()));
        }
    };

    Ok(SpooledUpload {
        path,
        file_name,
        content_type,
        folder_id,
    })
}

/// Upload a file
/// POST /api/files
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Response> {
    let upload = spool_multipart(multipart).await?;

    let media_type = upload
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let result = IngestionPipeline::ingest(
        &state.db,
        &state.blobs,
        &current_user.id,
        upload.folder_id.clone(),
        &upload.file_name,
        &media_type,
        &upload.path,
    )
    .await;

    upload.cleanup().await;

    let outcome = result?;
    let status = if outcome.is_new_blob {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(FileResponse::from(outcome.record))).into_response())
}

/// Check whether identical content is already stored, without persisting
/// POST /api/files/check-duplicate
pub async fn check_duplicate(
    State(state): State<AppState>,
    Extension(_current_user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Json<DuplicateCheckResponse>> {
    let upload = spool_multipart(multipart).await?;

    let result = IngestionPipeline::check_duplicate(&state.db, &upload.path).await;

    upload.cleanup().await;

    let existing = result?;
    Ok(Json(DuplicateCheckResponse {
        duplicate_found: existing.is_some(),
        file: existing.map(FileResponse::from),
    }))
}

/// List files with optional filters
/// GET /api/files?name=&content_type=&date_from=&date_to=
pub async fn list_files(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(filters): Query<FileFilters>,
) -> Result<Json<Vec<FileResponse>>> {
    let records = FileCatalog::list_by_owner(&state.db, &current_user.id, &filters).await?;
    Ok(Json(records.into_iter().map(FileResponse::from).collect()))
}

/// Get a single file record
/// GET /api/files/:id
pub async fn get_file(
    State(state): State<AppState>,
    Extension(_current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>> {
    let record = FileCatalog::get(&state.db, &id).await?;
    Ok(Json(FileResponse::from(record)))
}

/// Download a file's content
/// GET /api/files/:id/download
pub async fn download_file(
    State(state): State<AppState>,
    Extension(_current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response> {
    let record = FileCatalog::get(&state.db, &id).await?;

    // NotFound here means the catalog row exists but the bytes are gone
    let (file, _) = state.blobs.open(&record.storage_path).await?;

    let fallback_name = record.name.replace(['"', '\\'], "_");
    let encoded_name = urlencoding::encode(&record.name).into_owned();

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, record.media_type)
        .header(header::CONTENT_LENGTH, record.size_bytes)
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"; filename*=UTF-8''{}",
                fallback_name, encoded_name
            ),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::Storage(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Toggle the starred flag
/// POST /api/files/:id/star
pub async fn star_file(
    State(state): State<AppState>,
    Extension(_current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>> {
    let record = FileCatalog::toggle_star(&state.db, &id).await?;
    Ok(Json(FileResponse::from(record)))
}

/// Move a file to trash (logical only; bytes stay on disk)
/// POST /api/files/:id/trash
pub async fn trash_file(
    State(state): State<AppState>,
    Extension(_current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>> {
    let record = FileCatalog::set_trashed(&state.db, &id, true).await?;
    Ok(Json(FileResponse::from(record)))
}

/// Restore a file from trash
/// POST /api/files/:id/restore
pub async fn restore_file(
    State(state): State<AppState>,
    Extension(_current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>> {
    let record = FileCatalog::set_trashed(&state.db, &id, false).await?;
    Ok(Json(FileResponse::from(record)))
}

/// Most recent non-trashed files
/// GET /api/files/recent?limit=
pub async fn recent_files(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<FileResponse>>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT).max(1);
    let records = FileCatalog::recent(&state.db, &current_user.id, limit).await?;
    Ok(Json(records.into_iter().map(FileResponse::from).collect()))
}

/// Starred non-trashed files
/// GET /api/files/starred
pub async fn starred_files(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<Vec<FileResponse>>> {
    let records = FileCatalog::starred(&state.db, &current_user.id).await?;
    Ok(Json(records.into_iter().map(FileResponse::from).collect()))
}
