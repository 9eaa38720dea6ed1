//! Daily streak tracking
//!
//! A streak day is "used" by the first activity inside it. Activity 24-48h after
//! the last counted one extends the streak; anything later breaks it unless a
//! freeze is armed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};

/// Hours after the last counted activity before a new day can be counted
pub const STREAK_DAY_HOURS: i64 = 24;

/// Hours after the last counted activity at which the streak breaks
pub const STREAK_BREAK_HOURS: i64 = 48;

/// How long a freeze protects the streak once armed
pub const FREEZE_DURATION_HOURS: i64 = 24;

/// Persisted streak data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreakState {
    /// Absent until the first counted activity
    pub last_activity_timestamp: Option<DateTime<Utc>>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub freeze_active: bool,
    pub freeze_expires_at: Option<DateTime<Utc>>,
}

impl StreakState {
    /// Whether an armed freeze still protects the streak at `now`
    pub fn freeze_protects(&self, now: DateTime<Utc>) -> bool {
        self.freeze_active && self.freeze_expires_at.is_some_and(|expires| now <= expires)
    }

    /// Streak still alive (next activity would not reset it)
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.last_activity_timestamp {
            Some(last) => now - last < Duration::hours(STREAK_BREAK_HOURS) || self.freeze_protects(now),
            None => false,
        }
    }

    /// A new streak day can be counted (and the streak needs one to survive)
    pub fn is_at_risk(&self, now: DateTime<Utc>) -> bool {
        match self.last_activity_timestamp {
            Some(last) => self.current_streak > 0 && now - last >= Duration::hours(STREAK_DAY_HOURS),
            None => false,
        }
    }

    /// Whole hours left before the streak breaks, ignoring freezes
    pub fn hours_until_break(&self, now: DateTime<Utc>) -> Option<i64> {
        let last = self.last_activity_timestamp?;
        let deadline = last + Duration::hours(STREAK_BREAK_HOURS);
        Some((deadline - now).num_hours().max(0))
    }
}

/// What a single evaluation did to the streak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// Already counted inside the current day
    Unchanged,
    /// First ever activity
    Started,
    /// Continued into a new day
    Extended { count: u32 },
    /// Gap would have broken the streak, the freeze absorbed it
    FreezeConsumed { count: u32 },
    /// Streak broke and restarted at 1
    Reset { previous: u32 },
}

/// Where an armed freeze came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezeSource {
    Purchase,
    ChestReward,
}

impl FreezeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::ChestReward => "chest_reward",
        }
    }
}

/// Stateless streak rules
pub struct StreakTracker;

impl StreakTracker {
    /// Apply an activity at `now` and return the resulting state
    pub fn evaluate(state: &StreakState, now: DateTime<Utc>) -> StreakState {
        Self::apply(state, now).0
    }

    /// Same as [`evaluate`](Self::evaluate) but also reports what changed
    pub fn apply(state: &StreakState, now: DateTime<Utc>) -> (StreakState, StreakChange) {
        let mut next = state.clone();

        let Some(last) = state.last_activity_timestamp else {
            next.current_streak = 1;
            next.last_activity_timestamp = Some(now);
            next.longest_streak = next.longest_streak.max(1);
            return (next, StreakChange::Started);
        };

        let elapsed = now - last;

        // Clock skew (now before last) counts as the same day
        if elapsed < Duration::hours(STREAK_DAY_HOURS) {
            return (next, StreakChange::Unchanged);
        }

        if elapsed < Duration::hours(STREAK_BREAK_HOURS) {
            Self::continue_streak(&mut next, now);
            let count = next.current_streak;
            return (next, StreakChange::Extended { count });
        }

        if state.freeze_protects(now) {
            Self::continue_streak(&mut next, now);
            next.freeze_active = false;
            next.freeze_expires_at = None;
            let count = next.current_streak;
            debug!(streak = count, "Streak freeze consumed");
            return (next, StreakChange::FreezeConsumed { count });
        }

        let previous = state.current_streak;
        next.current_streak = 1;
        next.last_activity_timestamp = Some(now);
        next.longest_streak = next.longest_streak.max(1);
        // An unused freeze that expired before the break is gone
        next.freeze_active = false;
        next.freeze_expires_at = None;
        (next, StreakChange::Reset { previous })
    }

    /// Arm a freeze valid for [`FREEZE_DURATION_HOURS`]
    pub fn purchase_freeze(
        state: &StreakState,
        now: DateTime<Utc>,
        source: FreezeSource,
    ) -> Result<StreakState> {
        if state.freeze_protects(now) {
            return Err(EngineError::invalid_state(
                "a streak freeze is already active",
            ));
        }

        let mut next = state.clone();
        next.freeze_active = true;
        next.freeze_expires_at = Some(now + Duration::hours(FREEZE_DURATION_HOURS));
        debug!(source = source.as_str(), "Streak freeze armed");
        Ok(next)
    }

    fn continue_streak(state: &mut StreakState, now: DateTime<Utc>) {
        state.current_streak += 1;
        state.last_activity_timestamp = Some(now);
        state.longest_streak = state.longest_streak.max(state.current_streak);
    }
}
