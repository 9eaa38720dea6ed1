//! Sync command implementation

use anyhow::{Result, bail};
use tracing::info;

use lingo::config::Config;
use lingo::sync::{SqliteRemote, SyncCoordinator};

use super::lesson::print_event;

/// Merge local state with the remote copy
pub async fn sync_command(config: &Config) -> Result<()> {
    if !config.sync.enabled {
        bail!("Sync is disabled in the config ([sync] enabled = false)");
    }
    config.validate()?;

    let remote_path = config.remote_path();
    let remote = SqliteRemote::open(&remote_path)?;
    info!(remote = %remote_path.display(), "Using remote store");

    let coordinator = SyncCoordinator::new(remote, config.sync.user_id.clone());
    let mut engine = super::open_engine(config).await?;

    for event in engine.sync(&coordinator).await? {
        print_event(&event);
    }
    Ok(())
}
