//! Folder tree bookkeeping.
//!
//! Folders are plain containers: files hold a weak reference that is cleared
//! when the folder goes away, never cascaded onto the file records.

use chrono::Utc;
use uuid::Uuid;

use crate::catalog::FileCatalog;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{CreateFolderRequest, Folder};

/// Folder service
pub struct FolderService;

impl FolderService {
    /// Get a folder by ID
    pub async fn get(db: &Database, id: &str) -> Result<Folder> {
        let folder: Folder = sqlx::query_as("SELECT * FROM folders WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Folder not found".to_string()))?;

        Ok(folder)
    }

    /// List all folders for an owner
    pub async fn list_by_owner(db: &Database, owner_id: &str) -> Result<Vec<Folder>> {
        let folders: Vec<Folder> =
            sqlx::query_as("SELECT * FROM folders WHERE owner_id = ? ORDER BY name ASC")
                .bind(owner_id)
                .fetch_all(db.pool())
                .await?;

        Ok(folders)
    }

    /// Create a folder
    pub async fn create(
        db: &Database,
        owner_id: &str,
        req: CreateFolderRequest,
    ) -> Result<Folder> {
        if req.name.is_empty() || req.name.contains('/') || req.name.contains('\\') {
            return Err(AppError::Validation("Invalid folder name".to_string()));
        }

        // Parent must exist and belong to the same owner
        if let Some(ref parent_id) = req.parent_id {
            let parent = Self::get(db, parent_id).await?;
            if parent.owner_id != owner_id {
                return Err(AppError::NotFound("Folder not found".to_string()));
            }
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO folders (id, owner_id, name, parent_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(owner_id)
        .bind(&req.name)
        .bind(&req.parent_id)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await?;

        Self::get(db, &id).await
    }

    /// Rename a folder
    pub async fn rename(
        db: &Database,
        owner_id: &str,
        folder_id: &str,
        new_name: String,
    ) -> Result<Folder> {
        if new_name.is_empty() || new_name.contains('/') || new_name.contains('\\') {
            return Err(AppError::Validation("Invalid folder name".to_string()));
        }

        let folder = Self::get(db, folder_id).await?;
        if folder.owner_id != owner_id {
            return Err(AppError::NotFound("Folder not found".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE folders SET name = ?, updated_at = ? WHERE id = ?")
            .bind(&new_name)
            .bind(&now)
            .bind(folder_id)
            .execute(db.pool())
            .await?;

        Self::get(db, folder_id).await
    }

    /// Delete a folder and its subtree. File records referencing any deleted
    /// folder keep existing with their reference cleared.
    pub async fn delete(db: &Database, owner_id: &str, folder_id: &str) -> Result<()> {
        let folder = Self::get(db, folder_id).await?;
        if folder.owner_id != owner_id {
            return Err(AppError::NotFound("Folder not found".to_string()));
        }

        Self::delete_recursive(db, folder_id).await
    }

    fn delete_recursive<'a>(
        db: &'a Database,
        folder_id: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let children: Vec<Folder> =
                sqlx::query_as("SELECT * FROM folders WHERE parent_id = ?")
                    .bind(folder_id)
                    .fetch_all(db.pool())
                    .await?;

            for child in children {
                Self::delete_recursive(db, &child.id).await?;
            }

            FileCatalog::clear_folder_refs(db, folder_id).await?;

            sqlx::query("DELETE FROM folders WHERE id = ?")
                .bind(folder_id)
                .execute(db.pool())
                .await?;

            Ok(())
        })
    }
}
