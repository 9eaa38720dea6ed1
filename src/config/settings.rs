//! Settings configuration types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::{RecompletionPolicy, RewardTier};

/// Which local store backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per key
    #[default]
    File,
    /// Key-value table in a SQLite database
    Sqlite,
    /// Nothing survives the process
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

/// Local storage settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Data directory (defaults to ~/.lingo/)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Progression settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressionSettings {
    /// `award` gives XP again for practice runs, `once` rejects them
    #[serde(default)]
    pub recompletion: RecompletionPolicy,
}

/// Remote sync settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_sync_enabled")]
    pub enabled: bool,

    /// Account the progress rows are stored under
    #[serde(default)]
    pub user_id: String,

    /// SQLite database standing in for the remote store (defaults to ~/.lingo/remote.db)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<PathBuf>,
}

fn default_sync_enabled() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: default_sync_enabled(),
            user_id: String::new(),
            remote_path: None,
        }
    }
}

/// Daily chest settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChestSettings {
    #[serde(default)]
    pub tier: RewardTier,
}
