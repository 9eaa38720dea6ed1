//! Engagement engine: streaks, chest rewards, progression and badges
//!
//! Every rule here is a pure function over explicit state values. [`Engine`]
//! is the single ownership root that ties them to a store and a clock.

mod catalog;
mod checker;
mod definitions;
mod levels;
mod manager;
mod progression;
mod rewards;
mod state;
mod streaks;

pub use catalog::{Lesson, LessonCatalog, LessonId};
pub use checker::{AchievementEvaluator, Badge, BadgeSet};
pub use definitions::{BADGES, BadgeCategory, BadgeDefinition, BadgeId, BadgeRule};
pub use levels::{LEVELS, Level, LevelProgress, level_for_xp};
pub use manager::{Engine, EngineEvent};
pub use progression::{
    CompletionOutcome, LessonProgress, ProgressionLedger, ProgressionState, RecompletionPolicy,
    scaled_score, streak_multiplier,
};
pub use rewards::{
    CHEST_WINDOW_HOURS, ChestState, Rarity, Reward, RewardEngine, RewardSlot, RewardTable,
    RewardTier, RewardType,
};
pub use state::{ProgressRecord, UserSnapshot};
pub use streaks::{
    FREEZE_DURATION_HOURS, FreezeSource, STREAK_BREAK_HOURS, STREAK_DAY_HOURS, StreakChange,
    StreakState, StreakTracker,
};
