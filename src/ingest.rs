//! Ingestion pipeline: hash, dedup-check, persist, catalog-insert.
//!
//! Dedup is optimistic. The digest lookup is only a fast path; the UNIQUE
//! index on `content_digest` is the source of truth, and a losing insert is
//! reconciled by returning the winning record. The speculative blob write
//! before the insert is always safe: identical digest means identical bytes.

use std::path::Path;

use crate::blobstore::BlobStore;
use crate::catalog::{FileCatalog, NewFileRecord};
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::hashing;
use crate::models::FileRecord;

/// Result of one ingestion call
#[derive(Debug)]
pub struct IngestionOutcome {
    pub record: FileRecord,
    /// False when identical content was already cataloged
    pub is_new_blob: bool,
}

/// Ingestion pipeline service
pub struct IngestionPipeline;

impl IngestionPipeline {
    /// Ingest a spooled upload as one logical operation.
    ///
    /// The catalog row only appears after the bytes are fully published, so
    /// no partial record is ever visible. Disk failures leave the catalog
    /// untouched.
    pub async fn ingest(
        db: &Database,
        blobs: &BlobStore,
        owner_id: &str,
        folder_id: Option<String>,
        filename: &str,
        media_type: &str,
        spool: &Path,
    ) -> Result<IngestionOutcome> {
        if filename.is_empty() || filename.contains('/') || filename.contains('\\') {
            return Err(AppError::Validation("Invalid file name".to_string()));
        }

        if let Some(ref fid) = folder_id {
            let folder = crate::folders::FolderService::get(db, fid).await?;
            if folder.owner_id != owner_id {
                return Err(AppError::NotFound("Folder not found".to_string()));
            }
        }

        let digest = hashing::digest_file(spool)
            .await
            .map_err(|e| AppError::Storage(format!("hash upload: {}", e)))?;

        // Fast path: identical content already cataloged
        if let Some(existing) = FileCatalog::find_by_digest(db, &digest).await? {
            tracing::debug!("Dedup hit for digest {}", digest);
            return Ok(IngestionOutcome {
                record: existing,
                is_new_blob: false,
            });
        }

        let size_bytes = tokio::fs::metadata(spool)
            .await
            .map_err(|e| AppError::Storage(format!("stat upload: {}", e)))?
            .len() as i64;

        let storage_path = blobs.put(&digest, filename, spool).await?;

        let new_record = NewFileRecord {
            owner_id: owner_id.to_string(),
            folder_id,
            name: filename.to_string(),
            content_digest: digest.clone(),
            media_type: media_type.to_string(),
            size_bytes,
            storage_path,
        };

        match FileCatalog::insert(db, new_record).await {
            Ok(record) => {
                tracing::info!("Ingested {} as digest {}", filename, digest);
                Ok(IngestionOutcome {
                    record,
                    is_new_blob: true,
                })
            }
            Err(AppError::Conflict(_)) => {
                // A concurrent ingestion of the same content won between the
                // lookup and the insert. The just-written blob is identical
                // bytes; return the winner instead of a duplicate record.
                let winner = FileCatalog::find_by_digest(db, &digest)
                    .await?
                    .ok_or_else(|| {
                        AppError::Storage(format!("digest {} vanished after conflict", digest))
                    })?;
                tracing::debug!("Lost ingestion race for digest {}", digest);
                Ok(IngestionOutcome {
                    record: winner,
                    is_new_blob: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Same hashing path as ingestion, without persistence
    pub async fn check_duplicate(db: &Database, spool: &Path) -> Result<Option<FileRecord>> {
        let digest = hashing::digest_file(spool)
            .await
            .map_err(|e| AppError::Storage(format!("hash upload: {}", e)))?;

        FileCatalog::find_by_digest(db, &digest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Env {
        _temp_dir: TempDir,
        db: Database,
        blobs: BlobStore,
        spool_dir: std::path::PathBuf,
    }

    async fn setup() -> Env {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(temp_dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        db.run_migrations().await.unwrap();
        let blobs = BlobStore::new(temp_dir.path().join("uploads"));
        let spool_dir = temp_dir.path().join("spool");
        std::fs::create_dir_all(&spool_dir).unwrap();
        Env {
            _temp_dir: temp_dir,
            db,
            blobs,
            spool_dir,
        }
    }

    async fn spool(env: &Env, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = env.spool_dir.join(name);
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    async fn ingest(env: &Env, owner: &str, name: &str, content: &[u8]) -> IngestionOutcome {
        let path = spool(env, &format!("spool-{}-{}", owner, name), content).await;
        IngestionPipeline::ingest(&env.db, &env.blobs, owner, None, name, "text/plain", &path)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn first_ingestion_creates_record_and_blob() {
        let env = setup().await;

        let outcome = ingest(&env, "u1", "hello.txt", b"hello world").await;

        assert!(outcome.is_new_blob);
        assert_eq!(outcome.record.size_bytes, 11);
        assert_eq!(outcome.record.content_digest.len(), 64);
        assert!(env.blobs.exists(&outcome.record.content_digest).await);
        assert_eq!(
            outcome.record.storage_path,
            format!("{}/hello.txt", outcome.record.content_digest)
        );
    }

    #[tokio::test]
    async fn reingest_returns_existing_record() {
        let env = setup().await;

        let first = ingest(&env, "u1", "hello.txt", b"hello world").await;
        let second = ingest(&env, "u1", "renamed.txt", b"hello world").await;

        assert!(!second.is_new_blob);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.name, "hello.txt");

        let all: Vec<FileRecord> = sqlx::query_as("SELECT * FROM files")
            .fetch_all(env.db.pool())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn dedup_applies_across_owners() {
        let env = setup().await;

        let first = ingest(&env, "u1", "a.txt", b"shared content").await;
        let second = ingest(&env, "u2", "b.txt", b"shared content").await;

        assert!(!second.is_new_blob);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.owner_id, "u1");
    }

    #[tokio::test]
    async fn different_contents_do_not_collide() {
        let env = setup().await;

        let a = ingest(&env, "u1", "same-name.txt", b"content one").await;
        let b = ingest(&env, "u1", "same-name.txt", b"content two").await;

        assert!(a.is_new_blob);
        assert!(b.is_new_blob);
        assert_ne!(a.record.content_digest, b.record.content_digest);
        assert_ne!(a.record.storage_path, b.record.storage_path);
    }

    #[tokio::test]
    async fn invalid_filename_is_rejected_before_any_work() {
        let env = setup().await;
        let path = spool(&env, "spool", b"data").await;

        let err = IngestionPipeline::ingest(
            &env.db,
            &env.blobs,
            "u1",
            None,
            "../escape.txt",
            "text/plain",
            &path,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_folder_is_not_found() {
        let env = setup().await;
        let path = spool(&env, "spool", b"data").await;

        let err = IngestionPipeline::ingest(
            &env.db,
            &env.blobs,
            "u1",
            Some("missing".to_string()),
            "a.txt",
            "text/plain",
            &path,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_spool_leaves_catalog_untouched() {
        let env = setup().await;

        let err = IngestionPipeline::ingest(
            &env.db,
            &env.blobs,
            "u1",
            None,
            "a.txt",
            "text/plain",
            &env.spool_dir.join("never-written"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files")
            .fetch_one(env.db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn trash_leaves_blob_in_place() {
        let env = setup().await;
        let outcome = ingest(&env, "u1", "keep.txt", b"kept bytes").await;

        crate::catalog::FileCatalog::set_trashed(&env.db, &outcome.record.id, true)
            .await
            .unwrap();

        assert!(env.blobs.exists(&outcome.record.content_digest).await);
        let (_, len) = env.blobs.open(&outcome.record.storage_path).await.unwrap();
        assert_eq!(len, 10);
    }

    #[tokio::test]
    async fn check_duplicate_never_persists() {
        let env = setup().await;
        let path = spool(&env, "probe", b"probe content").await;

        assert!(IngestionPipeline::check_duplicate(&env.db, &path)
            .await
            .unwrap()
            .is_none());

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files")
            .fetch_one(env.db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 0);

        let ingested = ingest(&env, "u1", "probe.txt", b"probe content").await;
        let found = IngestionPipeline::check_duplicate(&env.db, &path)
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, ingested.record.id);
    }

    #[tokio::test]
    async fn concurrent_identical_ingestions_yield_one_record() {
        let env = Arc::new(setup().await);
        let content = b"raced content".to_vec();

        let mut handles = Vec::new();
        for i in 0..4 {
            let env = Arc::clone(&env);
            let content = content.clone();
            handles.push(tokio::spawn(async move {
                let path = spool(&env, &format!("race-{}", i), &content).await;
                IngestionPipeline::ingest(
                    &env.db,
                    &env.blobs,
                    "u1",
                    None,
                    "raced.txt",
                    "text/plain",
                    &path,
                )
                .await
                .unwrap()
            }));
        }

        let mut new_blobs = 0;
        let mut ids = Vec::new();
        for handle in handles {
            let outcome = handle.await.unwrap();
            if outcome.is_new_blob {
                new_blobs += 1;
            }
            ids.push(outcome.record.id);
        }

        assert_eq!(new_blobs, 1);
        assert!(ids.iter().all(|id| id == &ids[0]));

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files")
            .fetch_one(env.db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
