//! JSON-file backed store: one `<key>.json` per key under a directory

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use fs2::FileExt;

use super::PersistentStore;
use super::queue::WriteQueue;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    queue: WriteQueue,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            queue: WriteQueue::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

/// Take the cross-process lock guarding `path`.
///
/// The lock file is separate from the data file so the rename doesn't drop it.
/// It is released when the returned handle is dropped.
fn lock_path(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
    }
    let lock_file_path = path.with_extension("json.lock");
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&lock_file_path)
        .with_context(|| format!("Failed to create lock file: {}", lock_file_path.display()))?;
    lock_file
        .lock_exclusive()
        .with_context(|| format!("Failed to acquire store lock: {}", lock_file_path.display()))?;
    Ok(lock_file)
}

/// Write and sync `content` next to `path`, returning the temp path to rename
fn stage(path: &Path, content: &str) -> anyhow::Result<PathBuf> {
    let temp_path = path.with_extension("json.tmp");
    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
    temp_file
        .write_all(content.as_bytes())
        .with_context(|| "Failed to write store content")?;
    temp_file
        .sync_all()
        .with_context(|| "Failed to sync store file")?;
    Ok(temp_path)
}

fn replace(temp_path: &Path, path: &Path) -> anyhow::Result<()> {
    std::fs::rename(temp_path, path)
        .with_context(|| format!("Failed to rename store file: {}", path.display()))
}

/// Write `content` to `path` with an exclusive lock and temp file + rename
fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    let _lock = lock_path(path)?;
    let temp_path = stage(path, content)?;
    replace(&temp_path, path)
}

/// Replace several files under their locks, taken in path order.
///
/// Renames happen back to back only after every temp file is synced.
fn write_all_atomic(mut staged: Vec<(PathBuf, String)>) -> anyhow::Result<()> {
    // Last entry for a path wins
    staged.reverse();
    staged.sort_by(|a, b| a.0.cmp(&b.0));
    staged.dedup_by(|next, kept| next.0 == kept.0);

    let _locks = staged
        .iter()
        .map(|(path, _)| lock_path(path))
        .collect::<anyhow::Result<Vec<File>>>()?;

    let mut renames = Vec::with_capacity(staged.len());
    for (path, content) in &staged {
        renames.push((stage(path, content)?, path));
    }
    for (temp_path, path) in renames {
        replace(&temp_path, path)?;
    }
    Ok(())
}

fn read_optional(path: &Path) -> anyhow::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

#[async_trait]
impl PersistentStore for JsonFileStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || read_optional(&path))
            .await
            .map_err(|e| EngineError::storage(key, anyhow!(e)))?
            .map_err(|e| EngineError::storage(key, e))
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.queue.acquire(key).await;
        let path = self.path_for(key);
        let content = value.to_string();
        tokio::task::spawn_blocking(move || write_atomic(&path, &content))
            .await
            .map_err(|e| EngineError::storage(key, anyhow!(e)))?
            .map_err(|e| EngineError::storage(key, e))
    }

    /// Each file is replaced atomically under its lock; see [`write_all_atomic`]
    async fn write_batch(&self, entries: &[(&str, String)]) -> Result<()> {
        let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
        let _guards = self.queue.acquire_many(&keys).await;
        let batch_key = keys.join(",");

        let staged: Vec<(PathBuf, String)> = entries
            .iter()
            .map(|(key, value)| (self.path_for(key), value.clone()))
            .collect();

        tokio::task::spawn_blocking(move || write_all_atomic(staged))
            .await
            .map_err(|e| EngineError::storage(&batch_key, anyhow!(e)))?
            .map_err(|e| EngineError::storage(&batch_key, e))
    }
}
