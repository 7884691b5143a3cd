//! Content-addressed blob storage.
//!
//! Bytes live at `<root>/<digest>/<original-filename>`. A blob is written to
//! a temp file in the destination directory and atomically renamed into
//! place, so readers never see a partial file. Blobs are immutable after
//! publish and are never deleted here.

use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Local content-addressed blob store
#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
}

impl BlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Storage path for a digest and filename, relative to the upload root.
    /// Two different contents never collide: the digest disambiguates.
    pub fn storage_path(digest: &str, filename: &str) -> String {
        format!("{}/{}", digest, filename)
    }

    fn full_path(&self, storage_path: &str) -> PathBuf {
        self.base_path.join(storage_path)
    }

    /// Persist the content of `source` under the digest directory.
    ///
    /// Safe against the double-write race: concurrent puts for the same
    /// digest carry identical bytes, and the rename publishes whichever
    /// write finishes last. Returns the relative storage path.
    pub async fn put(&self, digest: &str, filename: &str, source: &Path) -> Result<String> {
        let dir = self.base_path.join(digest);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Storage(format!("create {}: {}", dir.display(), e)))?;

        let tmp_path = dir.join(format!(".tmp-{}", Uuid::new_v4()));
        let final_path = dir.join(filename);

        let result = self.write_via_temp(source, &tmp_path, &final_path).await;
        if result.is_err() {
            // Best-effort cleanup of the unpublished temp file
            let _ = fs::remove_file(&tmp_path).await;
        }
        result?;

        tracing::debug!("Published blob {}", final_path.display());
        Ok(Self::storage_path(digest, filename))
    }

    async fn write_via_temp(&self, source: &Path, tmp: &Path, dest: &Path) -> Result<()> {
        let mut reader = fs::File::open(source)
            .await
            .map_err(|e| AppError::Storage(format!("open {}: {}", source.display(), e)))?;
        let mut writer = fs::File::create(tmp)
            .await
            .map_err(|e| AppError::Storage(format!("create {}: {}", tmp.display(), e)))?;

        tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|e| AppError::Storage(format!("write {}: {}", tmp.display(), e)))?;
        writer
            .sync_all()
            .await
            .map_err(|e| AppError::Storage(format!("sync {}: {}", tmp.display(), e)))?;
        drop(writer);

        fs::rename(tmp, dest)
            .await
            .map_err(|e| AppError::Storage(format!("publish {}: {}", dest.display(), e)))?;

        Ok(())
    }

    /// Whether any published blob exists for this digest
    pub async fn exists(&self, digest: &str) -> bool {
        let dir = self.base_path.join(digest);
        match fs::read_dir(&dir).await {
            Ok(mut entries) => loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => {
                        let name = entry.file_name();
                        if !name.to_string_lossy().starts_with(".tmp-") {
                            break true;
                        }
                    }
                    _ => break false,
                }
            },
            Err(_) => false,
        }
    }

    /// Open a published blob for reading, returning the handle and its size.
    ///
    /// A missing blob is `NotFound` so callers can tell "catalog row exists
    /// but bytes are gone" apart from other storage failures.
    pub async fn open(&self, storage_path: &str) -> Result<(fs::File, u64)> {
        let full_path = self.full_path(storage_path);

        let file = match fs::File::open(&full_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound("File not found on server".to_string()));
            }
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "open {}: {}",
                    full_path.display(),
                    e
                )));
            }
        };

        let len = file
            .metadata()
            .await
            .map_err(|e| AppError::Storage(format!("stat {}: {}", full_path.display(), e)))?
            .len();

        Ok((file, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    async fn setup() -> (TempDir, BlobStore, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path().join("uploads"));
        let source = temp_dir.path().join("source.bin");
        (temp_dir, store, source)
    }

    async fn read_all(store: &BlobStore, storage_path: &str) -> Vec<u8> {
        let (mut file, _) = store.open(storage_path).await.unwrap();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn put_and_open() {
        let (_tmp, store, source) = setup().await;
        fs::write(&source, b"hello blob").await.unwrap();

        let digest = "a".repeat(64);
        let path = store.put(&digest, "greeting.txt", &source).await.unwrap();

        assert_eq!(path, format!("{}/greeting.txt", digest));
        assert!(store.exists(&digest).await);

        let (_, len) = store.open(&path).await.unwrap();
        assert_eq!(len, 10);
        assert_eq!(read_all(&store, &path).await, b"hello blob");
    }

    #[tokio::test]
    async fn open_missing_is_not_found() {
        let (_tmp, store, _) = setup().await;

        let err = store.open("deadbeef/gone.txt").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn exists_is_false_for_unknown_digest() {
        let (_tmp, store, _) = setup().await;
        assert!(!store.exists(&"f".repeat(64)).await);
    }

    #[tokio::test]
    async fn no_temp_files_left_after_put() {
        let (_tmp, store, source) = setup().await;
        fs::write(&source, b"content").await.unwrap();

        let digest = "b".repeat(64);
        store.put(&digest, "file.bin", &source).await.unwrap();

        let dir = store.base_path().join(&digest);
        let mut entries = fs::read_dir(&dir).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["file.bin".to_string()]);
    }

    #[tokio::test]
    async fn redundant_put_is_idempotent() {
        let (_tmp, store, source) = setup().await;
        fs::write(&source, b"same bytes").await.unwrap();

        let digest = "c".repeat(64);
        let first = store.put(&digest, "dup.txt", &source).await.unwrap();
        let second = store.put(&digest, "dup.txt", &source).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(read_all(&store, &first).await, b"same bytes");
    }

    #[tokio::test]
    async fn different_digests_never_collide() {
        let (_tmp, store, source) = setup().await;
        fs::write(&source, b"one").await.unwrap();
        let path_a = store.put(&"1".repeat(64), "same-name.txt", &source).await.unwrap();

        fs::write(&source, b"two").await.unwrap();
        let path_b = store.put(&"2".repeat(64), "same-name.txt", &source).await.unwrap();

        assert_ne!(path_a, path_b);
        assert_eq!(read_all(&store, &path_a).await, b"one");
        assert_eq!(read_all(&store, &path_b).await, b"two");
    }

    #[tokio::test]
    async fn put_missing_source_is_storage_error() {
        let (_tmp, store, source) = setup().await;

        let err = store
            .put(&"d".repeat(64), "x.bin", &source)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(!store.exists(&"d".repeat(64)).await);
    }
}
