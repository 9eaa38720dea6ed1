//! Lingo - engagement and progression engine for a language-learning client
//!
//! Decides whether a daily streak survives, what the daily chest contains, how
//! XP and levels accumulate, which badges unlock, and how the locally computed
//! state reconciles with a remote copy.
//!
//! ## Layout
//!
//! - [`engine`]: pure rules plus the [`engine::Engine`] composition root
//! - [`storage`]: key-value persistence (JSON files, SQLite, memory)
//! - [`sync`]: merge and the pull/push round trip against a remote store
//! - [`config`]: `~/.lingo/config.toml`

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod storage;
pub mod sync;

pub use error::{EngineError, Result};
