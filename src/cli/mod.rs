//! CLI command implementations

pub mod badges;
pub mod chest;
pub mod init;
pub mod lesson;
pub mod status;
pub mod sync;

use anyhow::{Context, Result};

use lingo::clock::SystemClock;
use lingo::config::Config;
use lingo::engine::{Engine, LessonCatalog, ProgressionLedger};
use lingo::storage::{PersistentStore, open_store};

pub type CliEngine = Engine<Box<dyn PersistentStore>, SystemClock>;

/// Open the configured store and load the engine from it
pub async fn open_engine(config: &Config) -> Result<CliEngine> {
    let store = open_store(&config.storage, &config.data_dir())?;
    let ledger = ProgressionLedger::new(
        LessonCatalog::builtin().clone(),
        config.progression.recompletion,
    );
    Engine::load(store, SystemClock, ledger)
        .await
        .context("Failed to load engine state")
}
