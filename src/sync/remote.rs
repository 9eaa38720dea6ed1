//! Remote store contract
//!
//! Two idempotent upserts carry everything the remote side needs; the remote
//! performs no business logic. The fetch calls are used for the pull half of a
//! sync.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::{
    Badge, BadgeId, BadgeSet, LessonId, LessonProgress, ProgressionState, StreakState,
    UserSnapshot,
};
use crate::error::{EngineError, Result};

/// Body of `syncProgress`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressPayload {
    pub completed_lessons: BTreeSet<LessonId>,
    pub lesson_progress: BTreeMap<LessonId, LessonProgress>,
    /// Current streak
    pub streak: u32,
    pub last_streak: u32,
    pub xp: u64,
    pub level: u32,
    pub perfect_lessons: BTreeSet<LessonId>,
    pub total_exercises_completed: u64,
    pub unlocked_lessons: BTreeSet<LessonId>,
    pub longest_streak: u32,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub freeze_active: bool,
    pub freeze_expires_at: Option<DateTime<Utc>>,
}

impl ProgressPayload {
    pub fn from_snapshot(snapshot: &UserSnapshot) -> Self {
        let p = &snapshot.progress;
        let s = &snapshot.streak;
        Self {
            completed_lessons: p.completed_lessons.clone(),
            lesson_progress: p.lesson_progress.clone(),
            streak: s.current_streak,
            last_streak: snapshot.last_streak,
            xp: p.xp,
            level: p.level,
            perfect_lessons: p.perfect_lessons.clone(),
            total_exercises_completed: p.total_exercises_completed,
            unlocked_lessons: p.unlocked_lessons.clone(),
            longest_streak: s.longest_streak,
            last_activity_at: s.last_activity_timestamp,
            freeze_active: s.freeze_active,
            freeze_expires_at: s.freeze_expires_at,
        }
    }

    pub fn progression(&self) -> ProgressionState {
        ProgressionState {
            xp: self.xp,
            level: self.level.max(1),
            completed_lessons: self.completed_lessons.clone(),
            perfect_lessons: self.perfect_lessons.clone(),
            total_exercises_completed: self.total_exercises_completed,
            unlocked_lessons: self.unlocked_lessons.clone(),
            lesson_progress: self.lesson_progress.clone(),
        }
    }

    pub fn streak_state(&self) -> StreakState {
        StreakState {
            last_activity_timestamp: self.last_activity_at,
            current_streak: self.streak,
            longest_streak: self.longest_streak.max(self.streak),
            freeze_active: self.freeze_active,
            freeze_expires_at: self.freeze_expires_at,
        }
    }
}

/// Row returned by the progress upsert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRow {
    pub user_id: String,
    #[serde(flatten)]
    pub progress: ProgressPayload,
    /// Milliseconds since epoch
    pub created_at: i64,
    pub updated_at: i64,
}

/// One earned badge as stored remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeRow {
    pub user_id: String,
    pub badge_id: String,
    pub earned: bool,
    pub earned_date: Option<DateTime<Utc>>,
    pub created_at: i64,
}

/// Rebuild a badge set from remote rows, skipping ids this build doesn't know
pub fn badges_from_rows(rows: &[BadgeRow]) -> BadgeSet {
    let mut list = Vec::with_capacity(rows.len());
    for row in rows.iter().filter(|r| r.earned) {
        match BadgeId::parse(&row.badge_id) {
            Some(id) => list.push(Badge {
                id,
                earned: true,
                earned_date: row.earned_date,
            }),
            None => warn!(badge_id = %row.badge_id, "Ignoring unknown remote badge"),
        }
    }
    BadgeSet::from(list)
}

/// Rebuild a full snapshot from what the remote holds
pub fn snapshot_from_remote(progress: Option<&ProgressRow>, badges: &[BadgeRow]) -> UserSnapshot {
    let mut snapshot = UserSnapshot {
        badges: badges_from_rows(badges),
        ..Default::default()
    };
    if let Some(row) = progress {
        snapshot.progress = row.progress.progression();
        snapshot.streak = row.progress.streak_state();
        snapshot.last_streak = row.progress.last_streak;
    }
    snapshot
}

/// The remote side of a sync
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_progress(&self, user_id: &str) -> Result<Option<ProgressRow>>;

    async fn fetch_badges(&self, user_id: &str) -> Result<Vec<BadgeRow>>;

    /// Update the user's row if it exists, insert otherwise
    async fn sync_progress(&self, user_id: &str, progress: &ProgressPayload) -> Result<ProgressRow>;

    /// Replace every badge row of the user with the currently earned badges
    async fn sync_badges(&self, user_id: &str, badges: &[Badge]) -> Result<Vec<BadgeRow>>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    async fn fetch_progress(&self, user_id: &str) -> Result<Option<ProgressRow>> {
        (**self).fetch_progress(user_id).await
    }

    async fn fetch_badges(&self, user_id: &str) -> Result<Vec<BadgeRow>> {
        (**self).fetch_badges(user_id).await
    }

    async fn sync_progress(&self, user_id: &str, progress: &ProgressPayload) -> Result<ProgressRow> {
        (**self).sync_progress(user_id, progress).await
    }

    async fn sync_badges(&self, user_id: &str, badges: &[Badge]) -> Result<Vec<BadgeRow>> {
        (**self).sync_badges(user_id, badges).await
    }
}

/// In-process remote, shared between "devices" in tests
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    progress: Arc<Mutex<HashMap<String, ProgressRow>>>,
    badges: Arc<Mutex<HashMap<String, Vec<BadgeRow>>>>,
    offline: Arc<AtomicBool>,
    fail_badge_push: Arc<AtomicBool>,
    pushes: Arc<AtomicUsize>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call, as if connectivity were lost
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail only the badge upsert (progress upsert still lands)
    pub fn set_fail_badge_push(&self, fail: bool) {
        self.fail_badge_push.store(fail, Ordering::SeqCst);
    }

    /// Number of successful upserts so far
    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(EngineError::sync("remote unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch_progress(&self, user_id: &str) -> Result<Option<ProgressRow>> {
        self.check_online()?;
        let rows = self.progress.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(user_id).cloned())
    }

    async fn fetch_badges(&self, user_id: &str) -> Result<Vec<BadgeRow>> {
        self.check_online()?;
        let rows = self.badges.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(user_id).cloned().unwrap_or_default())
    }

    async fn sync_progress(&self, user_id: &str, progress: &ProgressPayload) -> Result<ProgressRow> {
        self.check_online()?;
        let now = Utc::now().timestamp_millis();
        let mut rows = self.progress.lock().unwrap_or_else(|e| e.into_inner());
        let created_at = rows.get(user_id).map(|r| r.created_at).unwrap_or(now);
        let row = ProgressRow {
            user_id: user_id.to_string(),
            progress: progress.clone(),
            created_at,
            updated_at: now,
        };
        rows.insert(user_id.to_string(), row.clone());
        self.pushes.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    async fn sync_badges(&self, user_id: &str, badges: &[Badge]) -> Result<Vec<BadgeRow>> {
        self.check_online()?;
        if self.fail_badge_push.load(Ordering::SeqCst) {
            return Err(EngineError::sync("badge upsert rejected"));
        }
        let now = Utc::now().timestamp_millis();
        let inserted: Vec<BadgeRow> = badges
            .iter()
            .filter(|b| b.earned)
            .map(|b| BadgeRow {
                user_id: user_id.to_string(),
                badge_id: b.id.as_str().to_string(),
                earned: true,
                earned_date: b.earned_date,
                created_at: now,
            })
            .collect();
        self.badges
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.to_string(), inserted.clone());
        self.pushes.fetch_add(1, Ordering::SeqCst);
        Ok(inserted)
    }
}
