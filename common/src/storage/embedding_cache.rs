use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::AppError;
use crate::storage::store::StorageManager;

const CACHE_PREFIX: &str = "embed_cache";

/// Embedding cache for one source file, keyed by record hash.
///
/// Loaded whole from blob storage on open and written back whole on flush.
/// The blob location is derived from the file content digest, so renamed
/// copies of the same file share a cache and changed files get a fresh one.
pub struct EmbeddingCache {
    file_hash: String,
    entries: HashMap<String, Vec<f32>>,
    dirty: bool,
}

impl EmbeddingCache {
    fn location(file_hash: &str) -> String {
        format!("{CACHE_PREFIX}/{file_hash}.json")
    }

    /// Load the cache blob for `file_hash`, or start empty when none exists.
    ///
    /// A blob that exists but cannot be read or decoded is `CorruptCache`;
    /// silently starting empty would re-bill every row of the file.
    pub async fn open(storage: &StorageManager, file_hash: &str) -> Result<Self, AppError> {
        let location = Self::location(file_hash);
        let entries = match storage.get(&location).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| AppError::CorruptCache {
                    file_hash: file_hash.to_owned(),
                    reason: e.to_string(),
                })?
            }
            Err(object_store::Error::NotFound { .. }) => HashMap::new(),
            Err(e) => {
                return Err(AppError::CorruptCache {
                    file_hash: file_hash.to_owned(),
                    reason: e.to_string(),
                })
            }
        };

        debug!(file_hash, entries = entries.len(), "embedding cache opened");
        Ok(Self {
            file_hash: file_hash.to_owned(),
            entries,
            dirty: false,
        })
    }

    pub fn get(&self, record_hash: &str) -> Option<&Vec<f32>> {
        self.entries.get(record_hash)
    }

    pub fn insert(&mut self, record_hash: String, embedding: Vec<f32>) {
        self.entries.insert(record_hash, embedding);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist the cache if any entry was added since open; a clean cache
    /// skips the write entirely.
    pub async fn flush(&mut self, storage: &StorageManager) -> Result<(), AppError> {
        if !self.dirty {
            return Ok(());
        }

        let payload = serde_json::to_vec(&self.entries)
            .map_err(|e| AppError::InternalError(format!("failed to encode cache blob: {e}")))?;
        storage
            .put(&Self::location(&self.file_hash), Bytes::from(payload))
            .await?;
        self.dirty = false;

        debug!(
            file_hash = self.file_hash,
            entries = self.entries.len(),
            "embedding cache flushed"
        );
        Ok(())
    }
}

/// Per-file-hash mutual exclusion for cache open/flush cycles.
///
/// Two concurrent ingestions of the same file would otherwise race on the
/// shared blob and one flush would clobber the other.
#[derive(Clone, Default)]
pub struct CacheLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl CacheLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, file_hash: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut registry = self.locks.lock().await;
            registry
                .entry(file_hash.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_missing_cache_starts_empty_and_clean() {
        let storage = StorageManager::memory();
        let cache = EmbeddingCache::open(&storage, "nohash").await.expect("open");
        assert!(cache.is_empty());
        assert!(!cache.is_dirty());
    }

    #[tokio::test]
    async fn insert_dirties_and_flush_clears() {
        let storage = StorageManager::memory();
        let mut cache = EmbeddingCache::open(&storage, "filehash").await.expect("open");

        cache.insert("row".to_string(), vec![0.25, 0.5]);
        assert!(cache.is_dirty());
        assert_eq!(cache.len(), 1);

        cache.flush(&storage).await.expect("flush");
        assert!(!cache.is_dirty());
    }

    #[tokio::test]
    async fn flush_and_reopen_preserves_vectors_exactly() {
        let storage = StorageManager::memory();
        let vector = vec![0.1f32, -2.5, 3.0e-7, f32::MIN_POSITIVE];

        let mut cache = EmbeddingCache::open(&storage, "filehash").await.expect("open");
        cache.insert("rowhash".to_string(), vector.clone());
        cache.flush(&storage).await.expect("flush");

        let reopened = EmbeddingCache::open(&storage, "filehash").await.expect("reopen");
        assert_eq!(reopened.get("rowhash"), Some(&vector));
        assert!(!reopened.is_dirty());
    }

    #[tokio::test]
    async fn clean_flush_writes_nothing() {
        let storage = StorageManager::memory();
        let mut cache = EmbeddingCache::open(&storage, "untouched").await.expect("open");

        cache.flush(&storage).await.expect("flush");
        assert!(!storage
            .exists("embed_cache/untouched.json")
            .await
            .expect("exists check"));
    }

    #[tokio::test]
    async fn corrupt_blob_is_rejected_on_open() {
        let storage = StorageManager::memory();
        storage
            .put("embed_cache/badhash.json", Bytes::from_static(b"not json"))
            .await
            .expect("seed corrupt blob");

        let err = EmbeddingCache::open(&storage, "badhash").await;
        assert!(matches!(
            err,
            Err(AppError::CorruptCache { ref file_hash, .. }) if file_hash == "badhash"
        ));
    }

    #[tokio::test]
    async fn caches_for_different_files_are_independent() {
        let storage = StorageManager::memory();

        let mut first = EmbeddingCache::open(&storage, "file_a").await.expect("open a");
        first.insert("row".to_string(), vec![1.0]);
        first.flush(&storage).await.expect("flush a");

        let second = EmbeddingCache::open(&storage, "file_b").await.expect("open b");
        assert!(second.get("row").is_none());
    }

    #[tokio::test]
    async fn locks_serialize_same_file_hash() {
        let locks = CacheLocks::new();

        let guard = locks.acquire("filehash").await;
        let contended = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            locks.acquire("filehash"),
        )
        .await;
        assert!(contended.is_err(), "second acquire must wait for the guard");

        // A different file hash is not blocked.
        let _other = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            locks.acquire("otherhash"),
        )
        .await
        .expect("independent hash should not contend");

        drop(guard);
        let reacquired = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            locks.acquire("filehash"),
        )
        .await;
        assert!(reacquired.is_ok(), "dropping the guard releases the lock");
    }
}
