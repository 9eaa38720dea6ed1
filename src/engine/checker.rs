//! Badge evaluation
//!
//! Rules are checked in badge id order. A badge that is already earned is
//! skipped, so re-running on the same input never unlocks anything twice.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::definitions::{BADGES, BadgeDefinition, BadgeId};
use super::progression::ProgressionState;
use super::streaks::StreakState;

/// Persisted badge entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: BadgeId,
    pub earned: bool,
    #[serde(default)]
    pub earned_date: Option<DateTime<Utc>>,
}

impl Badge {
    pub fn locked(id: BadgeId) -> Self {
        Self {
            id,
            earned: false,
            earned_date: None,
        }
    }

    pub fn definition(&self) -> Option<&'static BadgeDefinition> {
        BadgeDefinition::get(self.id)
    }
}

/// Badge entry as read back from storage; the id may come from another build
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredBadge {
    id: String,
    #[serde(default)]
    earned: bool,
    #[serde(default)]
    earned_date: Option<DateTime<Utc>>,
}

/// All known badges keyed by id.
///
/// Serialized as a list with one entry per badge, earned or not. Unknown ids
/// in a stored list are dropped with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<StoredBadge>", into = "Vec<Badge>")]
pub struct BadgeSet {
    badges: BTreeMap<BadgeId, Badge>,
}

impl Default for BadgeSet {
    fn default() -> Self {
        Self {
            badges: BadgeId::all()
                .iter()
                .map(|id| (*id, Badge::locked(*id)))
                .collect(),
        }
    }
}

impl From<Vec<Badge>> for BadgeSet {
    fn from(list: Vec<Badge>) -> Self {
        let mut set = BadgeSet::default();
        for badge in list.into_iter().filter(|b| b.earned) {
            set.insert_earned(badge.id, badge.earned_date);
        }
        set
    }
}

impl From<Vec<StoredBadge>> for BadgeSet {
    fn from(list: Vec<StoredBadge>) -> Self {
        let mut set = BadgeSet::default();
        for stored in list.into_iter().filter(|b| b.earned) {
            match BadgeId::parse(&stored.id) {
                Some(id) => set.insert_earned(id, stored.earned_date),
                None => warn!(badge_id = %stored.id, "Ignoring unknown stored badge"),
            }
        }
        set
    }
}

impl From<BadgeSet> for Vec<Badge> {
    fn from(set: BadgeSet) -> Self {
        set.badges.into_values().collect()
    }
}

impl BadgeSet {
    pub fn get(&self, id: BadgeId) -> Option<&Badge> {
        self.badges.get(&id)
    }

    pub fn is_earned(&self, id: BadgeId) -> bool {
        self.badges.get(&id).is_some_and(|b| b.earned)
    }

    /// Earned badges in id order
    pub fn earned(&self) -> impl Iterator<Item = &Badge> {
        self.badges.values().filter(|b| b.earned)
    }

    pub fn earned_count(&self) -> usize {
        self.earned().count()
    }

    /// Every badge in id order
    pub fn iter(&self) -> impl Iterator<Item = &Badge> {
        self.badges.values()
    }

    /// Mark a badge earned. Returns `false` if it already was.
    pub fn earn(&mut self, id: BadgeId, at: DateTime<Utc>) -> bool {
        if self.is_earned(id) {
            return false;
        }
        self.insert_earned(id, Some(at));
        true
    }

    /// Union of earned badges, keeping the earliest earned date
    pub fn merge(&self, other: &BadgeSet) -> BadgeSet {
        let mut merged = self.clone();
        for badge in other.earned() {
            merged.insert_earned(badge.id, badge.earned_date);
        }
        merged
    }

    fn insert_earned(&mut self, id: BadgeId, date: Option<DateTime<Utc>>) {
        let entry = self.badges.entry(id).or_insert_with(|| Badge::locked(id));
        entry.earned_date = match (entry.earned, entry.earned_date, date) {
            (true, Some(existing), Some(incoming)) => Some(existing.min(incoming)),
            (true, existing, None) => existing,
            (true, None, incoming) => incoming,
            (false, _, incoming) => incoming,
        };
        entry.earned = true;
    }
}

/// Evaluates badge rules against progression and streak state
pub struct AchievementEvaluator;

impl AchievementEvaluator {
    /// Returns the updated set and the badges earned by this call, in id order
    pub fn evaluate(
        progress: &ProgressionState,
        streak: &StreakState,
        badges: &BadgeSet,
        now: DateTime<Utc>,
    ) -> (BadgeSet, Vec<BadgeId>) {
        let mut next = badges.clone();
        let mut newly_earned = Vec::new();

        let mut ordered: Vec<&BadgeDefinition> = BADGES.iter().collect();
        ordered.sort_by_key(|def| def.id);

        for def in ordered {
            if next.is_earned(def.id) {
                continue;
            }
            if def.rule.is_satisfied(progress, streak) && next.earn(def.id, now) {
                info!(badge = def.id.as_str(), name = def.name, "Badge earned");
                newly_earned.push(def.id);
            }
        }

        (next, newly_earned)
    }

    /// Progress towards every unearned badge as (current, target)
    pub fn progress(
        progress: &ProgressionState,
        streak: &StreakState,
        badges: &BadgeSet,
    ) -> Vec<(BadgeId, u64, u64)> {
        BADGES
            .iter()
            .filter(|def| !badges.is_earned(def.id))
            .map(|def| {
                let target = def.rule.target();
                let current = def.rule.measure(progress, streak).min(target);
                (def.id, current, target)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()
    }

    fn progress_with(lessons: &[&str], perfect: &[&str]) -> ProgressionState {
        let mut state = ProgressionState::default();
        for l in lessons {
            state.completed_lessons.insert(l.to_string());
            state.unlocked_lessons.insert(l.to_string());
        }
        for p in perfect {
            state.perfect_lessons.insert(p.to_string());
        }
        state
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let progress = progress_with(&["basics-1"], &["basics-1"]);
        let streak = StreakState {
            current_streak: 3,
            longest_streak: 3,
            ..Default::default()
        };

        let (set, first) =
            AchievementEvaluator::evaluate(&progress, &streak, &BadgeSet::default(), now());
        assert_eq!(
            first,
            vec![BadgeId::FirstLesson, BadgeId::Perfect1, BadgeId::Streak3]
        );

        let (again, second) = AchievementEvaluator::evaluate(&progress, &streak, &set, now());
        assert!(second.is_empty());
        assert_eq!(again, set);
    }

    #[test]
    fn test_simultaneous_unlocks_sorted_by_id() {
        let mut progress = progress_with(&["basics-1"], &[]);
        progress.level = 10;
        progress.xp = 2500;
        let streak = StreakState::default();

        let (_, earned) =
            AchievementEvaluator::evaluate(&progress, &streak, &BadgeSet::default(), now());
        let mut sorted = earned.clone();
        sorted.sort();
        assert_eq!(earned, sorted);
        assert_eq!(
            earned,
            vec![
                BadgeId::FirstLesson,
                BadgeId::Level10,
                BadgeId::Level5,
                BadgeId::Xp1000
            ]
        );
    }

    #[test]
    fn test_earned_date_set_once() {
        let progress = progress_with(&["basics-1"], &[]);
        let streak = StreakState::default();
        let (set, _) =
            AchievementEvaluator::evaluate(&progress, &streak, &BadgeSet::default(), now());
        let (later, _) = AchievementEvaluator::evaluate(
            &progress,
            &streak,
            &set,
            now() + Duration::days(3),
        );
        assert_eq!(
            later.get(BadgeId::FirstLesson).and_then(|b| b.earned_date),
            Some(now())
        );
    }

    #[test]
    fn test_badges_never_unearned() {
        let mut set = BadgeSet::default();
        set.earn(BadgeId::Streak30, now());

        // Streak dropped back to nothing, badge stays
        let (next, earned) = AchievementEvaluator::evaluate(
            &ProgressionState::default(),
            &StreakState::default(),
            &set,
            now(),
        );
        assert!(earned.is_empty());
        assert!(next.is_earned(BadgeId::Streak30));
    }

    #[test]
    fn test_merge_keeps_earliest_date() {
        let mut a = BadgeSet::default();
        let mut b = BadgeSet::default();
        a.earn(BadgeId::Streak3, now());
        b.earn(BadgeId::Streak3, now() - Duration::days(2));
        b.earn(BadgeId::Perfect1, now());

        let ab = a.merge(&b);
        let ba = b.merge(&a);
        assert_eq!(ab, ba);
        assert_eq!(
            ab.get(BadgeId::Streak3).and_then(|b| b.earned_date),
            Some(now() - Duration::days(2))
        );
        assert_eq!(ab.earned_count(), 2);
    }

    #[test]
    fn test_serializes_as_full_list() {
        let mut set = BadgeSet::default();
        set.earn(BadgeId::Level5, now());

        let json = serde_json::to_string(&set).unwrap();
        let list: Vec<Badge> = serde_json::from_str(&json).unwrap();
        assert_eq!(list.len(), BadgeId::all().len());
        assert!(json.contains("\"id\":\"level_5\""));

        let back: BadgeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_unknown_stored_badge_is_skipped() {
        let json = r#"[
            {"id":"first_lesson","earned":true,"earnedDate":"2024-01-01T10:00:00Z"},
            {"id":"from_newer_build","earned":true,"earnedDate":"2024-01-02T10:00:00Z"}
        ]"#;
        let set: BadgeSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.earned_count(), 1);
        assert!(set.is_earned(BadgeId::FirstLesson));
        assert_eq!(set.iter().count(), BadgeId::all().len());
    }

    #[test]
    fn test_progress_report() {
        let progress = progress_with(&["a", "b", "c"], &[]);
        let report =
            AchievementEvaluator::progress(&progress, &StreakState::default(), &BadgeSet::default());
        let lessons_10 = report
            .iter()
            .find(|(id, _, _)| *id == BadgeId::Lessons10)
            .unwrap();
        assert_eq!((lessons_10.1, lessons_10.2), (3, 10));
    }
}
