//! Streaming content hashing.
//!
//! The digest is the dedup and storage key: hex-encoded SHA-256, computed
//! incrementally so arbitrarily large uploads never need full buffering.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

const HASH_BUF_SIZE: usize = 64 * 1024;

/// Incremental content hasher
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Feed a chunk of content. Chunk boundaries do not affect the digest.
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    /// Finish and return the lowercase hex digest
    pub fn finalize(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash everything a reader yields, with a fixed-size buffer.
/// Read errors propagate unchanged; there is no retry here.
pub async fn digest_reader<R>(reader: &mut R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize())
}

/// Hash the content of a file on disk
pub async fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    digest_reader(&mut file).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn known_vector() {
        let mut hasher = ContentHasher::new();
        hasher.update(b"abc");
        assert_eq!(
            hasher.finalize(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_is_chunking_independent() {
        let content: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

        let mut whole = ContentHasher::new();
        whole.update(&content);
        let expected = whole.finalize();

        for chunk_size in [1, 7, 64, 4096, 10_000] {
            let mut hasher = ContentHasher::new();
            for chunk in content.chunks(chunk_size) {
                hasher.update(chunk);
            }
            assert_eq!(hasher.finalize(), expected, "chunk size {}", chunk_size);
        }
    }

    #[test]
    fn empty_input() {
        let hasher = ContentHasher::new();
        assert_eq!(
            hasher.finalize(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn reader_matches_incremental() {
        let content = b"the quick brown fox".to_vec();

        let mut hasher = ContentHasher::new();
        hasher.update(&content);
        let expected = hasher.finalize();

        let mut cursor = Cursor::new(content);
        assert_eq!(digest_reader(&mut cursor).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn file_matches_reader() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("payload.bin");
        let content = vec![0xABu8; 200_000];
        tokio::fs::write(&path, &content).await.unwrap();

        let mut cursor = Cursor::new(content);
        let expected = digest_reader(&mut cursor).await.unwrap();

        assert_eq!(digest_file(&path).await.unwrap(), expected);
    }
}
