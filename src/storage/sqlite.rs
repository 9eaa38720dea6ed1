//! SQLite key-value store
//!
//! A single `kv` table, opened in WAL mode. Batches are written in one
//! transaction.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use super::PersistentStore;
use super::queue::WriteQueue;
use crate::error::{EngineError, Result};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    queue: WriteQueue,
}

impl SqliteStore {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store dir: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store db: {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::from_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize kv schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            queue: WriteQueue::new(),
        })
    }

    fn with_conn<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&mut Connection) -> anyhow::Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Store DB lock poisoned"))?;
        f(&mut conn)
    }
}

#[async_trait]
impl PersistentStore for SqliteStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |r| r.get(0))
                .optional()
                .with_context(|| format!("Failed to read key {}", key))
        })
        .map_err(|e| EngineError::storage(key, e))
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.queue.acquire(key).await;
        let now = Utc::now().timestamp_millis();
        self.with_conn(|conn| {
            conn.execute(
                r#"INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                   ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3"#,
                (key, value, now),
            )
            .with_context(|| format!("Failed to write key {}", key))?;
            Ok(())
        })
        .map_err(|e| EngineError::storage(key, e))
    }

    async fn write_batch(&self, entries: &[(&str, String)]) -> Result<()> {
        let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
        let _guards = self.queue.acquire_many(&keys).await;
        let now = Utc::now().timestamp_millis();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for (key, value) in entries {
                tx.execute(
                    r#"INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                       ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3"#,
                    (key, value, now),
                )
                .with_context(|| format!("Failed to write key {}", key))?;
            }
            tx.commit().context("Failed to commit batch")?;
            Ok(())
        })
        .map_err(|e| EngineError::storage(keys.join(","), e))
    }
}
