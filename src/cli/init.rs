//! Init command implementation

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

use lingo::config::Config;

/// Write a default config with a fresh user id
pub async fn init_command(config_path: Option<&Path>, force: bool) -> Result<()> {
    let config_path: PathBuf = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::global_config_path);

    if config_path.exists() && !force {
        bail!(
            "Configuration already exists: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::with_defaults();
    config.save_to_file(&config_path)?;

    println!("Created: {}", config_path.display());
    println!("  user id:  {}", config.sync.user_id);
    println!("  backend:  {}", config.storage.backend.as_str());
    println!("  data dir: {}", config.data_dir().display());

    Ok(())
}
