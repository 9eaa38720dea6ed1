//! Configuration loading and management

mod io;
mod settings;

pub use settings::{
    ChestSettings, ProgressionSettings, StorageBackend, StorageSettings, SyncSettings,
};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub progression: ProgressionSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub chest: ChestSettings,
}

impl Config {
    /// Create a config with defaults and a fresh user id
    pub fn with_defaults() -> Self {
        let mut config = Self::default();
        config.sync.user_id = uuid::Uuid::new_v4().to_string();
        config
    }

    /// Check settings that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.sync.enabled && self.sync.user_id.trim().is_empty() {
            bail!("sync is enabled but sync.user_id is empty (run `lingo init`)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{RecompletionPolicy, RewardTier};

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.progression.recompletion, RecompletionPolicy::Award);
        assert_eq!(config.chest.tier, RewardTier::Free);
        assert!(config.sync.enabled);
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            backend = "sqlite"
            path = "/tmp/lingo"

            [progression]
            recompletion = "once"

            [sync]
            user_id = "user-1"
            remote_path = "/tmp/remote.db"

            [chest]
            tier = "premium"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.progression.recompletion, RecompletionPolicy::Once);
        assert_eq!(config.sync.user_id, "user-1");
        assert_eq!(config.chest.tier, RewardTier::Premium);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_user_id() {
        let config = Config::default();
        assert!(config.validate().is_err());
        assert!(Config::with_defaults().validate().is_ok());
    }
}
