//! File catalog - the metadata record store.
//!
//! Enforces the dedup invariant through the UNIQUE index on
//! `content_digest`: at most one record per content, with `insert` surfacing
//! a `Conflict` the ingestion pipeline reconciles.

use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FileFilters, FileRecord};

pub const DEFAULT_RECENT_LIMIT: i64 = 10;

/// Data for a new file record
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub owner_id: String,
    pub folder_id: Option<String>,
    pub name: String,
    pub content_digest: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub storage_path: String,
}

/// File catalog service
pub struct FileCatalog;

impl FileCatalog {
    /// Dedup lookup: point query on the unique digest index
    pub async fn find_by_digest(db: &Database, digest: &str) -> Result<Option<FileRecord>> {
        let record: Option<FileRecord> =
            sqlx::query_as("SELECT * FROM files WHERE content_digest = ?")
                .bind(digest)
                .fetch_optional(db.pool())
                .await?;

        Ok(record)
    }

    /// Get a file record by ID
    pub async fn get(db: &Database, id: &str) -> Result<FileRecord> {
        let record: FileRecord = sqlx::query_as("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        Ok(record)
    }

    /// Insert a new record. A duplicate digest surfaces as `Conflict`; the
    /// ingestion pipeline treats that as a benign race and returns the
    /// winner instead of erroring the caller.
    pub async fn insert(db: &Database, new: NewFileRecord) -> Result<FileRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO files (id, owner_id, folder_id, name, content_digest, media_type, size_bytes, storage_path, starred, trashed, trashed_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 0, NULL, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.owner_id)
        .bind(&new.folder_id)
        .bind(&new.name)
        .bind(&new.content_digest)
        .bind(&new.media_type)
        .bind(new.size_bytes)
        .bind(&new.storage_path)
        .bind(&now)
        .execute(db.pool())
        .await;

        match result {
            Ok(_) => Self::get(db, &id).await,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
                format!("Record already exists for digest {}", new.content_digest),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// List files for an owner with optional conjunctive filters
    pub async fn list_by_owner(
        db: &Database,
        owner_id: &str,
        filters: &FileFilters,
    ) -> Result<Vec<FileRecord>> {
        let mut sql = String::from("SELECT * FROM files WHERE owner_id = ?");
        if filters.name.is_some() {
            sql.push_str(" AND LOWER(name) LIKE ?");
        }
        if filters.content_type.is_some() {
            sql.push_str(" AND media_type = ?");
        }
        if filters.date_from.is_some() {
            sql.push_str(" AND date(created_at) >= date(?)");
        }
        if filters.date_to.is_some() {
            sql.push_str(" AND date(created_at) <= date(?)");
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut query = sqlx::query_as::<_, FileRecord>(&sql).bind(owner_id);
        if let Some(name) = &filters.name {
            query = query.bind(format!("%{}%", name.to_lowercase()));
        }
        if let Some(content_type) = &filters.content_type {
            query = query.bind(content_type);
        }
        if let Some(date_from) = &filters.date_from {
            query = query.bind(date_from);
        }
        if let Some(date_to) = &filters.date_to {
            query = query.bind(date_to);
        }

        Ok(query.fetch_all(db.pool()).await?)
    }

    /// Flip the starred flag and return the updated record
    pub async fn toggle_star(db: &Database, id: &str) -> Result<FileRecord> {
        let record = Self::get(db, id).await?;

        sqlx::query("UPDATE files SET starred = ? WHERE id = ?")
            .bind(!record.starred)
            .bind(id)
            .execute(db.pool())
            .await?;

        Self::get(db, id).await
    }

    /// Set the trash flag. Trashing stamps `trashed_at`; untrashing clears it.
    pub async fn set_trashed(db: &Database, id: &str, trashed: bool) -> Result<FileRecord> {
        // NotFound before the blind update
        Self::get(db, id).await?;

        if trashed {
            let now = Utc::now().to_rfc3339();
            sqlx::query("UPDATE files SET trashed = 1, trashed_at = ? WHERE id = ?")
                .bind(&now)
                .bind(id)
                .execute(db.pool())
                .await?;
        } else {
            sqlx::query("UPDATE files SET trashed = 0, trashed_at = NULL WHERE id = ?")
                .bind(id)
                .execute(db.pool())
                .await?;
        }

        Self::get(db, id).await
    }

    /// Most recent non-trashed files for an owner
    pub async fn recent(db: &Database, owner_id: &str, limit: i64) -> Result<Vec<FileRecord>> {
        let records: Vec<FileRecord> = sqlx::query_as(
            "SELECT * FROM files WHERE owner_id = ? AND trashed = 0 ORDER BY created_at DESC LIMIT ?",
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(db.pool())
        .await?;

        Ok(records)
    }

    /// Starred, non-trashed files for an owner
    pub async fn starred(db: &Database, owner_id: &str) -> Result<Vec<FileRecord>> {
        let records: Vec<FileRecord> = sqlx::query_as(
            "SELECT * FROM files WHERE owner_id = ? AND starred = 1 AND trashed = 0 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(db.pool())
        .await?;

        Ok(records)
    }

    /// Clear folder references when a folder goes away. The records stay;
    /// only the weak reference is dropped.
    pub async fn clear_folder_refs(db: &Database, folder_id: &str) -> Result<()> {
        sqlx::query("UPDATE files SET folder_id = NULL WHERE folder_id = ?")
            .bind(folder_id)
            .execute(db.pool())
            .await?;

        Ok(())
    }
}
