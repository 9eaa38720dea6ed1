//! Badge definitions and unlock rules
//!
//! Every badge is defined here with a declarative rule over progression and
//! streak state.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::progression::ProgressionState;
use super::streaks::StreakState;
use crate::error::EngineError;

/// Unique identifier for each badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BadgeId {
    // Lesson milestones
    FirstLesson,
    Lessons10,
    Lessons25,

    // Accuracy
    Perfect1,
    Perfect10,

    // Practice volume
    Exercises100,
    Exercises1000,

    // Streaks
    Streak3,
    Streak7,
    Streak14,
    Streak30,
    Streak100,

    // Levels and XP
    Level5,
    Level10,
    Xp1000,
}

impl BadgeId {
    /// Stable string id used in storage and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstLesson => "first_lesson",
            Self::Lessons10 => "lessons_10",
            Self::Lessons25 => "lessons_25",
            Self::Perfect1 => "perfect_1",
            Self::Perfect10 => "perfect_10",
            Self::Exercises100 => "exercises_100",
            Self::Exercises1000 => "exercises_1000",
            Self::Streak3 => "streak_3",
            Self::Streak7 => "streak_7",
            Self::Streak14 => "streak_14",
            Self::Streak30 => "streak_30",
            Self::Streak100 => "streak_100",
            Self::Level5 => "level_5",
            Self::Level10 => "level_10",
            Self::Xp1000 => "xp_1000",
        }
    }

    /// Parse a stored id
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|id| id.as_str() == s)
    }

    pub fn all() -> &'static [BadgeId] {
        &[
            Self::FirstLesson,
            Self::Lessons10,
            Self::Lessons25,
            Self::Perfect1,
            Self::Perfect10,
            Self::Exercises100,
            Self::Exercises1000,
            Self::Streak3,
            Self::Streak7,
            Self::Streak14,
            Self::Streak30,
            Self::Streak100,
            Self::Level5,
            Self::Level10,
            Self::Xp1000,
        ]
    }
}

// Badges are ordered by their string id so evaluation order is stable
impl Ord for BadgeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for BadgeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for BadgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<BadgeId> for String {
    fn from(id: BadgeId) -> Self {
        id.as_str().to_string()
    }
}

impl TryFrom<String> for BadgeId {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| EngineError::unknown_badge(value))
    }
}

/// Badge category for grouping in UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeCategory {
    Lessons,
    Accuracy,
    Practice,
    Streak,
    Level,
}

impl BadgeCategory {
    pub const ALL: [BadgeCategory; 5] = [
        Self::Lessons,
        Self::Accuracy,
        Self::Practice,
        Self::Streak,
        Self::Level,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Lessons => "Lessons",
            Self::Accuracy => "Accuracy",
            Self::Practice => "Practice",
            Self::Streak => "Streaks",
            Self::Level => "Levels",
        }
    }
}

/// Unlock condition of a badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeRule {
    LessonsCompleted(u64),
    PerfectLessons(u64),
    ExercisesCompleted(u64),
    /// Best streak ever reached, so merged devices count too
    StreakReached(u64),
    LevelReached(u64),
    XpEarned(u64),
}

impl BadgeRule {
    /// Current value of the measured quantity
    pub fn measure(&self, progress: &ProgressionState, streak: &StreakState) -> u64 {
        match self {
            Self::LessonsCompleted(_) => progress.completed_lessons.len() as u64,
            Self::PerfectLessons(_) => progress.perfect_lessons.len() as u64,
            Self::ExercisesCompleted(_) => progress.total_exercises_completed,
            Self::StreakReached(_) => streak.longest_streak.max(streak.current_streak) as u64,
            Self::LevelReached(_) => progress.level as u64,
            Self::XpEarned(_) => progress.xp,
        }
    }

    pub fn target(&self) -> u64 {
        match *self {
            Self::LessonsCompleted(n)
            | Self::PerfectLessons(n)
            | Self::ExercisesCompleted(n)
            | Self::StreakReached(n)
            | Self::LevelReached(n)
            | Self::XpEarned(n) => n,
        }
    }

    pub fn is_satisfied(&self, progress: &ProgressionState, streak: &StreakState) -> bool {
        self.measure(progress, streak) >= self.target()
    }
}

/// Badge definition with all metadata
#[derive(Debug, Clone)]
pub struct BadgeDefinition {
    pub id: BadgeId,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: BadgeCategory,
    pub rule: BadgeRule,
}

/// All badge definitions
pub static BADGES: &[BadgeDefinition] = &[
    // === LESSONS ===
    BadgeDefinition {
        id: BadgeId::FirstLesson,
        name: "First Words",
        description: "Complete your first lesson",
        icon: "🌱",
        category: BadgeCategory::Lessons,
        rule: BadgeRule::LessonsCompleted(1),
    },
    BadgeDefinition {
        id: BadgeId::Lessons10,
        name: "Bookworm",
        description: "Complete 10 lessons",
        icon: "📚",
        category: BadgeCategory::Lessons,
        rule: BadgeRule::LessonsCompleted(10),
    },
    BadgeDefinition {
        id: BadgeId::Lessons25,
        name: "Scholar",
        description: "Complete 25 lessons",
        icon: "🎓",
        category: BadgeCategory::Lessons,
        rule: BadgeRule::LessonsCompleted(25),
    },
    // === ACCURACY ===
    BadgeDefinition {
        id: BadgeId::Perfect1,
        name: "Flawless",
        description: "Finish a lesson without a single mistake",
        icon: "✨",
        category: BadgeCategory::Accuracy,
        rule: BadgeRule::PerfectLessons(1),
    },
    BadgeDefinition {
        id: BadgeId::Perfect10,
        name: "Perfectionist",
        description: "Finish 10 different lessons without mistakes",
        icon: "💎",
        category: BadgeCategory::Accuracy,
        rule: BadgeRule::PerfectLessons(10),
    },
    // === PRACTICE ===
    BadgeDefinition {
        id: BadgeId::Exercises100,
        name: "Practice Makes Progress",
        description: "Complete 100 exercises",
        icon: "💪",
        category: BadgeCategory::Practice,
        rule: BadgeRule::ExercisesCompleted(100),
    },
    BadgeDefinition {
        id: BadgeId::Exercises1000,
        name: "Drill Sergeant",
        description: "Complete 1000 exercises",
        icon: "🏋️",
        category: BadgeCategory::Practice,
        rule: BadgeRule::ExercisesCompleted(1000),
    },
    // === STREAK ===
    BadgeDefinition {
        id: BadgeId::Streak3,
        name: "On Fire",
        description: "Reach a 3-day streak",
        icon: "🔥",
        category: BadgeCategory::Streak,
        rule: BadgeRule::StreakReached(3),
    },
    BadgeDefinition {
        id: BadgeId::Streak7,
        name: "Week Warrior",
        description: "Reach a 7-day streak",
        icon: "📅",
        category: BadgeCategory::Streak,
        rule: BadgeRule::StreakReached(7),
    },
    BadgeDefinition {
        id: BadgeId::Streak14,
        name: "Fortnight Focus",
        description: "Reach a 14-day streak",
        icon: "⚡",
        category: BadgeCategory::Streak,
        rule: BadgeRule::StreakReached(14),
    },
    BadgeDefinition {
        id: BadgeId::Streak30,
        name: "Monthly Master",
        description: "Reach a 30-day streak",
        icon: "👑",
        category: BadgeCategory::Streak,
        rule: BadgeRule::StreakReached(30),
    },
    BadgeDefinition {
        id: BadgeId::Streak100,
        name: "Unstoppable",
        description: "Reach a 100-day streak",
        icon: "🏆",
        category: BadgeCategory::Streak,
        rule: BadgeRule::StreakReached(100),
    },
    // === LEVEL ===
    BadgeDefinition {
        id: BadgeId::Level5,
        name: "Explorer",
        description: "Reach level 5",
        icon: "🧭",
        category: BadgeCategory::Level,
        rule: BadgeRule::LevelReached(5),
    },
    BadgeDefinition {
        id: BadgeId::Level10,
        name: "Halfway Fluent",
        description: "Reach level 10",
        icon: "🗺️",
        category: BadgeCategory::Level,
        rule: BadgeRule::LevelReached(10),
    },
    BadgeDefinition {
        id: BadgeId::Xp1000,
        name: "XP Hoarder",
        description: "Earn 1000 XP",
        icon: "🪙",
        category: BadgeCategory::Level,
        rule: BadgeRule::XpEarned(1000),
    },
];

impl BadgeDefinition {
    /// Definition for a badge id
    pub fn get(id: BadgeId) -> Option<&'static BadgeDefinition> {
        BADGES.iter().find(|b| b.id == id)
    }

    pub fn total_count() -> usize {
        BADGES.len()
    }
}
