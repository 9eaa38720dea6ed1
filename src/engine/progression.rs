//! Progression ledger: XP, levels, completed lessons and unlocks

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog::{LessonCatalog, LessonId};
use super::levels::level_for_xp;
use crate::error::{EngineError, Result};

/// Per-lesson history kept alongside the completion sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonProgress {
    pub best_score: u64,
    pub attempts: u32,
}

impl LessonProgress {
    /// Field-wise max, used when reconciling devices
    pub fn merge(&self, other: &LessonProgress) -> LessonProgress {
        LessonProgress {
            best_score: self.best_score.max(other.best_score),
            attempts: self.attempts.max(other.attempts),
        }
    }
}

/// Persisted progression data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressionState {
    pub xp: u64,
    pub level: u32,
    pub completed_lessons: BTreeSet<LessonId>,
    pub perfect_lessons: BTreeSet<LessonId>,
    pub total_exercises_completed: u64,
    pub unlocked_lessons: BTreeSet<LessonId>,
    pub lesson_progress: BTreeMap<LessonId, LessonProgress>,
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            completed_lessons: BTreeSet::new(),
            perfect_lessons: BTreeSet::new(),
            total_exercises_completed: 0,
            unlocked_lessons: BTreeSet::new(),
            lesson_progress: BTreeMap::new(),
        }
    }
}

impl ProgressionState {
    /// Subset invariants between the three lesson sets
    pub fn is_consistent(&self) -> bool {
        self.level >= 1
            && self.completed_lessons.is_subset(&self.unlocked_lessons)
            && self.perfect_lessons.is_subset(&self.completed_lessons)
    }
}

/// What to do when a lesson that is already completed is completed again
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecompletionPolicy {
    /// Practice runs award their score again
    #[default]
    Award,
    /// Re-completion fails with `InvalidState`
    Once,
}

/// XP multiplier for the streak length at the time of completion
pub fn streak_multiplier(streak: u32) -> f64 {
    match streak {
        0..=2 => 1.0,
        3..=6 => 1.2,
        7..=13 => 1.5,
        14..=29 => 2.0,
        _ => 2.5,
    }
}

/// Apply the streak multiplier to a raw lesson score
pub fn scaled_score(base: u64, streak: u32) -> u64 {
    (base as f64 * streak_multiplier(streak)).round() as u64
}

/// Result of one lesson completion
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub state: ProgressionState,
    /// Lessons unlocked by this completion, in catalog order
    pub newly_unlocked: Vec<LessonId>,
    pub xp_awarded: u64,
    pub previous_level: u32,
    /// `false` when this was a practice run of an already completed lesson
    pub first_completion: bool,
}

impl CompletionOutcome {
    pub fn leveled_up(&self) -> bool {
        self.state.level > self.previous_level
    }
}

/// Applies lesson completions against a catalog
#[derive(Debug, Clone)]
pub struct ProgressionLedger {
    catalog: LessonCatalog,
    policy: RecompletionPolicy,
}

impl ProgressionLedger {
    pub fn new(catalog: LessonCatalog, policy: RecompletionPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn catalog(&self) -> &LessonCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> RecompletionPolicy {
        self.policy
    }

    /// Fresh state with the root lessons unlocked
    pub fn initial_state(&self) -> ProgressionState {
        ProgressionState {
            unlocked_lessons: self.catalog.initially_unlocked(),
            ..Default::default()
        }
    }

    /// Record a completed lesson.
    ///
    /// `score` must already include the streak multiplier (see [`scaled_score`]).
    pub fn complete_lesson(
        &self,
        state: &ProgressionState,
        lesson_id: &str,
        score: u64,
        exercise_count: u64,
        is_perfect: bool,
    ) -> Result<CompletionOutcome> {
        self.catalog.require(lesson_id)?;

        let mut next = state.clone();
        next.unlocked_lessons.extend(self.catalog.initially_unlocked());

        if !next.unlocked_lessons.contains(lesson_id) {
            return Err(EngineError::invalid_state(format!(
                "lesson '{}' is still locked",
                lesson_id
            )));
        }

        let first_completion = !next.completed_lessons.contains(lesson_id);
        if !first_completion && self.policy == RecompletionPolicy::Once {
            return Err(EngineError::invalid_state(format!(
                "lesson '{}' is already completed",
                lesson_id
            )));
        }

        next.completed_lessons.insert(lesson_id.to_string());
        if is_perfect {
            next.perfect_lessons.insert(lesson_id.to_string());
        }

        let entry = next.lesson_progress.entry(lesson_id.to_string()).or_default();
        entry.best_score = entry.best_score.max(score);
        entry.attempts = entry.attempts.saturating_add(1);

        // Saturate so XP stays monotonic on absurd inputs
        next.xp = next.xp.saturating_add(score);
        let xp_awarded = next.xp - state.xp;
        next.total_exercises_completed =
            next.total_exercises_completed.saturating_add(exercise_count);
        next.level = next.level.max(level_for_xp(next.xp));

        let newly_unlocked = self
            .catalog
            .newly_unlockable(&next.completed_lessons, &next.unlocked_lessons);
        next.unlocked_lessons.extend(newly_unlocked.iter().cloned());

        debug!(
            lesson_id,
            xp = next.xp,
            level = next.level,
            unlocked = newly_unlocked.len(),
            "Lesson completed"
        );

        Ok(CompletionOutcome {
            state: next,
            newly_unlocked,
            xp_awarded,
            previous_level: state.level,
            first_completion,
        })
    }

    /// Re-derive level and unlocks, e.g. after a merge
    pub fn normalize(&self, state: &ProgressionState) -> (ProgressionState, Vec<LessonId>) {
        let mut next = state.clone();
        next.level = next.level.max(level_for_xp(next.xp));
        next.unlocked_lessons.extend(self.catalog.initially_unlocked());
        // Completed lessons are unlocked by definition
        next.unlocked_lessons
            .extend(next.completed_lessons.iter().cloned());
        let newly_unlocked = self
            .catalog
            .newly_unlockable(&next.completed_lessons, &next.unlocked_lessons);
        next.unlocked_lessons.extend(newly_unlocked.iter().cloned());
        (next, newly_unlocked)
    }
}

impl Default for ProgressionLedger {
    fn default() -> Self {
        Self::new(LessonCatalog::builtin().clone(), RecompletionPolicy::default())
    }
}
