//! Key-value persistence
//!
//! The engine persists three JSON documents under fixed keys. Backends implement
//! [`PersistentStore`]; which one is used is decided once at startup from the
//! config (see [`open_store`]).

mod file;
mod memory;
mod queue;
mod sqlite;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use queue::WriteQueue;
pub use sqlite::SqliteStore;

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::config::{StorageBackend, StorageSettings};
use crate::error::{EngineError, Result};

/// Daily chest document
pub const CHEST_KEY: &str = "dailyChest";
/// Progression + streak document
pub const PROGRESS_KEY: &str = "userProgress";
/// Badge list document
pub const BADGES_KEY: &str = "badges";

/// Read/write contract shared by every backend.
///
/// Writes to the same key are serialized by the implementation.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>>;

    async fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Write several keys so that either all or (on failure) ideally none land
    async fn write_batch(&self, entries: &[(&str, String)]) -> Result<()> {
        for (key, value) in entries {
            self.write(key, value).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for Box<dyn PersistentStore> {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        (**self).write(key, value).await
    }

    async fn write_batch(&self, entries: &[(&str, String)]) -> Result<()> {
        (**self).write_batch(entries).await
    }
}

/// Read and decode a JSON document
pub async fn read_json<T, S>(store: &S, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: PersistentStore + ?Sized,
{
    match store.read(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| EngineError::storage(key, e)),
        None => Ok(None),
    }
}

/// Encode a value for [`PersistentStore::write`] / `write_batch`
pub fn encode_json<T: Serialize>(key: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| EngineError::storage(key, e))
}

/// Open the backend selected in the config
pub fn open_store(settings: &StorageSettings, data_dir: &Path) -> anyhow::Result<Box<dyn PersistentStore>> {
    let dir = settings.path.clone().unwrap_or_else(|| data_dir.to_path_buf());
    let store: Box<dyn PersistentStore> = match settings.backend {
        StorageBackend::File => Box::new(JsonFileStore::new(dir.join("state"))),
        StorageBackend::Sqlite => Box::new(SqliteStore::open(&dir.join("engine.db"))?),
        StorageBackend::Memory => Box::new(MemoryStore::new()),
    };
    info!(backend = settings.backend.as_str(), dir = %dir.display(), "Opened local store");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_json_helpers() {
        let store = MemoryStore::new();
        let encoded = encode_json(BADGES_KEY, &vec![1, 2, 3]).unwrap();
        store.write(BADGES_KEY, &encoded).await.unwrap();

        let decoded: Option<Vec<u32>> = read_json(&store, BADGES_KEY).await.unwrap();
        assert_eq!(decoded, Some(vec![1, 2, 3]));

        let missing: Option<Vec<u32>> = read_json(&store, CHEST_KEY).await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_storage_failure() {
        let store = MemoryStore::new();
        store.write(PROGRESS_KEY, "{not json").await.unwrap();
        let err = read_json::<serde_json::Value, _>(&store, PROGRESS_KEY)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StorageFailure { .. }));
    }

    #[tokio::test]
    async fn test_open_store_selects_backend() {
        let dir = tempdir().unwrap();
        for backend in [StorageBackend::File, StorageBackend::Sqlite, StorageBackend::Memory] {
            let settings = StorageSettings {
                backend,
                path: None,
            };
            let store = open_store(&settings, dir.path()).unwrap();
            store.write(CHEST_KEY, "{}").await.unwrap();
            assert_eq!(store.read(CHEST_KEY).await.unwrap().as_deref(), Some("{}"));
        }
        assert!(dir.path().join("engine.db").exists());
        assert!(dir.path().join("state/dailyChest.json").exists());
    }
}
