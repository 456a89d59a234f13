use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};

use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Durable blob storage with load-whole/save-whole semantics.
///
/// Backed by the local filesystem in production and by an in-memory store
/// in tests; the embedding cache keeps one blob per source-file hash here.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    backend_kind: StorageKind,
    local_base: Option<PathBuf>,
}

impl StorageManager {
    /// Create a new StorageManager for the configured backend.
    pub async fn new(cfg: &AppConfig) -> object_store::Result<Self> {
        let backend_kind = cfg.storage.clone();
        let (store, local_base) = create_storage_backend(cfg).await?;

        Ok(Self {
            store,
            backend_kind,
            local_base,
        })
    }

    /// An in-memory StorageManager, mainly for tests and offline runs.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            backend_kind: StorageKind::Memory,
            local_base: None,
        }
    }

    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    /// The resolved local base directory when using the local backend.
    pub fn local_base_path(&self) -> Option<&Path> {
        self.local_base.as_deref()
    }

    /// Store bytes at the specified location, replacing any prior version.
    pub async fn put(&self, location: &str, data: Bytes) -> object_store::Result<()> {
        let path = ObjPath::from(location);
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())
    }

    /// Retrieve the full contents stored at the specified location.
    pub async fn get(&self, location: &str) -> object_store::Result<Bytes> {
        let path = ObjPath::from(location);
        let result = self.store.get(&path).await?;
        result.bytes().await
    }

    /// Check if an object exists at the specified location.
    pub async fn exists(&self, location: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(location);
        self.store
            .head(&path)
            .await
            .map(|_| true)
            .or_else(|e| match e {
                object_store::Error::NotFound { .. } => Ok(false),
                _ => Err(e),
            })
    }
}

/// Create a storage backend based on configuration.
async fn create_storage_backend(
    cfg: &AppConfig,
) -> object_store::Result<(DynStore, Option<PathBuf>)> {
    match cfg.storage {
        StorageKind::Local => {
            let base = resolve_base_dir(cfg);
            if !base.exists() {
                tokio::fs::create_dir_all(&base).await.map_err(|e| {
                    object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: e.into(),
                    }
                })?;
            }
            let store = LocalFileSystem::new_with_prefix(base.clone())?;
            Ok((Arc::new(store), Some(base)))
        }
        StorageKind::Memory => {
            let store = InMemory::new();
            Ok((Arc::new(store), None))
        }
    }
}

/// Resolve the absolute base directory used for local storage from config.
///
/// If `data_dir` is relative, it is resolved against the current working directory.
pub fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    if cfg.data_dir.starts_with('/') {
        PathBuf::from(&cfg.data_dir)
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&cfg.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use uuid::Uuid;

    fn local_config(root: &str) -> AppConfig {
        AppConfig {
            data_dir: root.into(),
            storage: StorageKind::Local,
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn memory_backend_basic_operations() {
        let storage = StorageManager::memory();
        assert!(storage.local_base_path().is_none());

        let location = "embed_cache/abc123.json";
        let data = b"{\"rowhash\":[0.5,0.25]}";

        storage
            .put(location, Bytes::from(data.to_vec()))
            .await
            .expect("put");
        let retrieved = storage.get(location).await.expect("get");
        assert_eq!(retrieved.as_ref(), data);
        assert!(storage.exists(location).await.expect("exists check"));
        assert!(!storage
            .exists("embed_cache/other.json")
            .await
            .expect("exists check"));
    }

    #[tokio::test]
    async fn memory_backend_overwrites_in_place() {
        let storage = StorageManager::memory();
        let location = "embed_cache/overwrite.json";

        storage
            .put(location, Bytes::from_static(b"first"))
            .await
            .expect("put first");
        storage
            .put(location, Bytes::from_static(b"second"))
            .await
            .expect("put second");

        let retrieved = storage.get(location).await.expect("get");
        assert_eq!(retrieved.as_ref(), b"second");
    }

    #[tokio::test]
    async fn local_backend_persists_under_data_dir() {
        let base = format!("/tmp/kalkyl_storage_test_{}", Uuid::new_v4());
        let cfg = local_config(&base);
        let storage = StorageManager::new(&cfg).await.expect("create storage");
        let resolved_base = storage
            .local_base_path()
            .expect("resolved base dir")
            .to_path_buf();
        assert_eq!(resolved_base, PathBuf::from(&base));

        let location = "embed_cache/file.json";
        let data = b"cache blob bytes";

        storage
            .put(location, Bytes::from(data.to_vec()))
            .await
            .expect("put");
        let retrieved = storage.get(location).await.expect("get");
        assert_eq!(retrieved.as_ref(), data);

        tokio::fs::metadata(resolved_base.join("embed_cache"))
            .await
            .expect("cache directory exists after write");

        let _ = tokio::fs::remove_dir_all(&base).await;
    }

    #[tokio::test]
    async fn get_missing_location_reports_not_found() {
        let storage = StorageManager::memory();
        let err = storage.get("embed_cache/missing.json").await;
        assert!(matches!(err, Err(object_store::Error::NotFound { .. })));
    }
}
