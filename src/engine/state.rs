//! Snapshot of everything the engine owns for one user

use serde::{Deserialize, Serialize};

use super::checker::BadgeSet;
use super::progression::ProgressionState;
use super::streaks::StreakState;

/// Progression, streak and badges as one value.
///
/// Engine operations take a snapshot and produce a new one; the old value is
/// never touched, so a failed write simply keeps using it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSnapshot {
    pub progress: ProgressionState,
    pub streak: StreakState,
    /// Streak value before the last change, for "3 → 4" style UI
    pub last_streak: u32,
    pub badges: BadgeSet,
}

impl UserSnapshot {
    pub fn progress_record(&self) -> ProgressRecord {
        ProgressRecord {
            progress: self.progress.clone(),
            streak: self.streak.clone(),
            last_streak: self.last_streak,
        }
    }
}

/// Stored shape of the progress key: progression and streak fields side by side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    #[serde(flatten)]
    pub progress: ProgressionState,
    #[serde(flatten)]
    pub streak: StreakState,
    #[serde(default)]
    pub last_streak: u32,
}
