//! Deterministic merge of two user snapshots
//!
//! Every field is combined with max, union, or "most recent activity wins", so
//! the merge is commutative, associative and idempotent for valid snapshots.

use chrono::{DateTime, Utc};

use crate::engine::{ProgressionState, StreakState, UserSnapshot, level_for_xp};

/// Merge two independently evolved snapshots
pub fn merge(local: &UserSnapshot, remote: &UserSnapshot) -> UserSnapshot {
    let (streak, last_streak) = merge_streak(local, remote);
    UserSnapshot {
        progress: merge_progress(&local.progress, &remote.progress),
        streak,
        last_streak,
        badges: local.badges.merge(&remote.badges),
    }
}

/// Monotonic scalars take the max, lesson sets take the union
pub fn merge_progress(a: &ProgressionState, b: &ProgressionState) -> ProgressionState {
    let xp = a.xp.max(b.xp);

    let mut lesson_progress = a.lesson_progress.clone();
    for (id, theirs) in &b.lesson_progress {
        lesson_progress
            .entry(id.clone())
            .and_modify(|ours| *ours = ours.merge(theirs))
            .or_insert(*theirs);
    }

    ProgressionState {
        xp,
        level: a.level.max(b.level).max(level_for_xp(xp)),
        completed_lessons: a.completed_lessons.union(&b.completed_lessons).cloned().collect(),
        perfect_lessons: a.perfect_lessons.union(&b.perfect_lessons).cloned().collect(),
        total_exercises_completed: a.total_exercises_completed.max(b.total_exercises_completed),
        unlocked_lessons: a.unlocked_lessons.union(&b.unlocked_lessons).cloned().collect(),
        lesson_progress,
    }
}

type RecencyKey = (Option<DateTime<Utc>>, u32, Option<DateTime<Utc>>, bool, u32);

/// Total order used to pick the streak pair; recency first
fn recency_key(s: &UserSnapshot) -> RecencyKey {
    (
        s.streak.last_activity_timestamp,
        s.streak.current_streak,
        s.streak.freeze_expires_at,
        s.streak.freeze_active,
        s.last_streak,
    )
}

/// The streak pair (and its freeze) travels with the most recent activity
fn merge_streak(a: &UserSnapshot, b: &UserSnapshot) -> (StreakState, u32) {
    let winner = if recency_key(b) > recency_key(a) { b } else { a };

    let mut streak = winner.streak.clone();
    streak.longest_streak = a
        .streak
        .longest_streak
        .max(b.streak.longest_streak)
        .max(streak.current_streak);
    (streak, winner.last_streak)
}
