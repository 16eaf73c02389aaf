//! Optional cache of engine results, keyed by content hash

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Byte-level cache the runner consults before invoking the engine.
///
/// Implementations are best-effort: failures are misses, never errors.
#[async_trait]
pub trait ArtifactCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: &str, bytes: &[u8]);
}

/// Cache that stores nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl ArtifactCache for NoopCache {
    async fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    async fn put(&self, _key: &str, _bytes: &[u8]) {}
}

/// One file per key under a directory
#[derive(Debug, Clone)]
pub struct DirCache {
    dir: PathBuf,
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl DirCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `rprettier` under the per-user cache directory, if the platform has one.
    pub fn user_default() -> Option<Self> {
        dirs::cache_dir().map(|dir| Self::new(dir.join("rprettier")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactCache for DirCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        tokio::fs::read(self.dir.join(key)).await.ok()
    }

    async fn put(&self, key: &str, bytes: &[u8]) {
        let tmp = self.dir.join(format!(
            "{key}.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let result = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&tmp, bytes).await?;
            tokio::fs::rename(&tmp, self.dir.join(key)).await
        }
        .await;

        if let Err(e) = result {
            debug!("cache write to {} failed: {e}", self.dir.display());
            let _ = tokio::fs::remove_file(&tmp).await;
        }
    }
}

/// Hex SHA-256 over length-prefixed parts, so part boundaries are unambiguous.
pub fn cache_key(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}
