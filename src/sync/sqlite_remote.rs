//! SQLite stand-in for the remote relational store
//!
//! Mirrors the server tables: one `user_progress` row per user and one
//! `user_badges` row per earned badge.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::remote::{BadgeRow, ProgressPayload, ProgressRow, RemoteStore};
use crate::engine::Badge;
use crate::error::{EngineError, Result};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS user_progress (
    user_id TEXT PRIMARY KEY,
    completed_lessons TEXT NOT NULL,
    lesson_progress TEXT NOT NULL,
    streak INTEGER NOT NULL DEFAULT 0,
    last_streak INTEGER NOT NULL DEFAULT 0,
    longest_streak INTEGER NOT NULL DEFAULT 0,
    last_activity_at TEXT,
    freeze_active INTEGER NOT NULL DEFAULT 0,
    freeze_expires_at TEXT,
    xp INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    perfect_lessons TEXT NOT NULL,
    total_exercises_completed INTEGER NOT NULL DEFAULT 0,
    unlocked_lessons TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_badges (
    user_id TEXT NOT NULL,
    badge_id TEXT NOT NULL,
    earned INTEGER NOT NULL DEFAULT 1,
    earned_date TEXT,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, badge_id)
);
CREATE INDEX IF NOT EXISTS idx_user_badges_user ON user_badges(user_id);
"#;

const PROGRESS_COLUMNS: &str = "user_id, completed_lessons, lesson_progress, streak, last_streak, \
     longest_streak, last_activity_at, freeze_active, freeze_expires_at, xp, level, \
     perfect_lessons, total_exercises_completed, unlocked_lessons, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteRemote {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRemote {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create remote dir: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open remote db: {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize remote schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> anyhow::Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| EngineError::sync("remote DB lock poisoned"))?;
        f(&mut conn).map_err(EngineError::sync)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string(value).context("Failed to encode column")
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> anyhow::Result<T> {
    serde_json::from_str(raw).context("Failed to decode column")
}

/// SQLite integers are signed; clamp rather than wrap into negatives
fn sql_counter(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn parse_time(raw: Option<String>) -> anyhow::Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .with_context(|| format!("Invalid timestamp: {}", s))
    })
    .transpose()
}

/// Raw column values, decoded outside the rusqlite row closure
struct RawProgressRow {
    user_id: String,
    completed_lessons: String,
    lesson_progress: String,
    streak: u32,
    last_streak: u32,
    longest_streak: u32,
    last_activity_at: Option<String>,
    freeze_active: bool,
    freeze_expires_at: Option<String>,
    xp: i64,
    level: u32,
    perfect_lessons: String,
    total_exercises_completed: i64,
    unlocked_lessons: String,
    created_at: i64,
    updated_at: i64,
}

impl RawProgressRow {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: r.get(0)?,
            completed_lessons: r.get(1)?,
            lesson_progress: r.get(2)?,
            streak: r.get(3)?,
            last_streak: r.get(4)?,
            longest_streak: r.get(5)?,
            last_activity_at: r.get(6)?,
            freeze_active: r.get(7)?,
            freeze_expires_at: r.get(8)?,
            xp: r.get(9)?,
            level: r.get(10)?,
            perfect_lessons: r.get(11)?,
            total_exercises_completed: r.get(12)?,
            unlocked_lessons: r.get(13)?,
            created_at: r.get(14)?,
            updated_at: r.get(15)?,
        })
    }

    fn decode(self) -> anyhow::Result<ProgressRow> {
        Ok(ProgressRow {
            user_id: self.user_id,
            progress: ProgressPayload {
                completed_lessons: from_json(&self.completed_lessons)?,
                lesson_progress: from_json(&self.lesson_progress)?,
                streak: self.streak,
                last_streak: self.last_streak,
                xp: self.xp.max(0) as u64,
                level: self.level,
                perfect_lessons: from_json(&self.perfect_lessons)?,
                total_exercises_completed: self.total_exercises_completed.max(0) as u64,
                unlocked_lessons: from_json(&self.unlocked_lessons)?,
                longest_streak: self.longest_streak,
                last_activity_at: parse_time(self.last_activity_at)?,
                freeze_active: self.freeze_active,
                freeze_expires_at: parse_time(self.freeze_expires_at)?,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn select_progress(conn: &Connection, user_id: &str) -> anyhow::Result<Option<ProgressRow>> {
    let raw = conn
        .query_row(
            &format!("SELECT {} FROM user_progress WHERE user_id = ?1", PROGRESS_COLUMNS),
            [user_id],
            RawProgressRow::from_row,
        )
        .optional()
        .context("Failed to query user_progress")?;
    raw.map(RawProgressRow::decode).transpose()
}

#[async_trait]
impl RemoteStore for SqliteRemote {
    async fn fetch_progress(&self, user_id: &str) -> Result<Option<ProgressRow>> {
        self.with_conn(|conn| select_progress(conn, user_id))
    }

    async fn fetch_badges(&self, user_id: &str) -> Result<Vec<BadgeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, badge_id, earned, earned_date, created_at \
                 FROM user_badges WHERE user_id = ?1 ORDER BY badge_id",
            )?;
            let raw: Vec<(String, String, bool, Option<String>, i64)> = stmt
                .query_map([user_id], |r| {
                    Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
                })?
                .collect::<rusqlite::Result<_>>()?;

            raw.into_iter()
                .map(|(user_id, badge_id, earned, date, created_at)| -> anyhow::Result<BadgeRow> {
                    Ok(BadgeRow {
                        user_id,
                        badge_id,
                        earned,
                        earned_date: parse_time(date)?,
                        created_at,
                    })
                })
                .collect()
        })
    }

    async fn sync_progress(&self, user_id: &str, progress: &ProgressPayload) -> Result<ProgressRow> {
        let now = Utc::now().timestamp_millis();
        self.with_conn(|conn| {
            let completed = to_json(&progress.completed_lessons)?;
            let lesson_progress = to_json(&progress.lesson_progress)?;
            let perfect = to_json(&progress.perfect_lessons)?;
            let unlocked = to_json(&progress.unlocked_lessons)?;
            let last_activity = progress.last_activity_at.map(|t| t.to_rfc3339());
            let freeze_expires = progress.freeze_expires_at.map(|t| t.to_rfc3339());

            let tx = conn.transaction()?;
            let exists: bool = tx
                .query_row(
                    "SELECT COUNT(*) FROM user_progress WHERE user_id = ?1",
                    [user_id],
                    |r| r.get::<_, i64>(0),
                )
                .map(|c| c > 0)?;

            if exists {
                tx.execute(
                    r#"UPDATE user_progress SET
                        completed_lessons = ?2, lesson_progress = ?3, streak = ?4, last_streak = ?5,
                        longest_streak = ?6, last_activity_at = ?7, freeze_active = ?8,
                        freeze_expires_at = ?9, xp = ?10, level = ?11, perfect_lessons = ?12,
                        total_exercises_completed = ?13, unlocked_lessons = ?14, updated_at = ?15
                       WHERE user_id = ?1"#,
                    params![
                        user_id,
                        completed,
                        lesson_progress,
                        progress.streak,
                        progress.last_streak,
                        progress.longest_streak,
                        last_activity,
                        progress.freeze_active,
                        freeze_expires,
                        sql_counter(progress.xp),
                        progress.level,
                        perfect,
                        sql_counter(progress.total_exercises_completed),
                        unlocked,
                        now,
                    ],
                )
                .context("Failed to update user_progress")?;
            } else {
                tx.execute(
                    &format!(
                        "INSERT INTO user_progress ({}) VALUES \
                         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
                        PROGRESS_COLUMNS
                    ),
                    params![
                        user_id,
                        completed,
                        lesson_progress,
                        progress.streak,
                        progress.last_streak,
                        progress.longest_streak,
                        last_activity,
                        progress.freeze_active,
                        freeze_expires,
                        sql_counter(progress.xp),
                        progress.level,
                        perfect,
                        sql_counter(progress.total_exercises_completed),
                        unlocked,
                        now,
                    ],
                )
                .context("Failed to insert user_progress")?;
            }

            let row = select_progress(&tx, user_id)?
                .ok_or_else(|| anyhow!("user_progress row vanished for {}", user_id))?;
            tx.commit().context("Failed to commit progress upsert")?;
            Ok(row)
        })
    }

    async fn sync_badges(&self, user_id: &str, badges: &[Badge]) -> Result<Vec<BadgeRow>> {
        let now = Utc::now().timestamp_millis();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM user_badges WHERE user_id = ?1", [user_id])
                .context("Failed to clear user_badges")?;

            let mut inserted = Vec::new();
            for badge in badges.iter().filter(|b| b.earned) {
                let date = badge.earned_date.map(|t| t.to_rfc3339());
                tx.execute(
                    "INSERT INTO user_badges (user_id, badge_id, earned, earned_date, created_at) \
                     VALUES (?1, ?2, 1, ?3, ?4)",
                    params![user_id, badge.id.as_str(), date, now],
                )
                .with_context(|| format!("Failed to insert badge {}", badge.id))?;
                inserted.push(BadgeRow {
                    user_id: user_id.to_string(),
                    badge_id: badge.id.as_str().to_string(),
                    earned: true,
                    earned_date: badge.earned_date,
                    created_at: now,
                });
            }

            tx.commit().context("Failed to commit badge replace")?;
            Ok(inserted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BadgeId, BadgeSet, LessonProgress};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn payload() -> ProgressPayload {
        let mut p = ProgressPayload {
            xp: 320,
            level: 4,
            streak: 5,
            last_streak: 4,
            longest_streak: 9,
            total_exercises_completed: 77,
            last_activity_at: Some(Utc.with_ymd_and_hms(2026, 4, 1, 20, 15, 0).unwrap()),
            ..Default::default()
        };
        p.completed_lessons.insert("basics-1".into());
        p.unlocked_lessons.insert("basics-1".into());
        p.unlocked_lessons.insert("basics-2".into());
        p.lesson_progress.insert(
            "basics-1".into(),
            LessonProgress {
                best_score: 30,
                attempts: 2,
            },
        );
        p
    }

    #[tokio::test]
    async fn test_progress_insert_then_update() {
        let remote = SqliteRemote::open_in_memory().unwrap();
        assert!(remote.fetch_progress("u1").await.unwrap().is_none());

        let inserted = remote.sync_progress("u1", &payload()).await.unwrap();
        assert_eq!(inserted.progress, payload());
        assert_eq!(inserted.created_at, inserted.updated_at);

        let mut changed = payload();
        changed.xp = 400;
        let updated = remote.sync_progress("u1", &changed).await.unwrap();
        assert_eq!(updated.created_at, inserted.created_at);
        assert_eq!(updated.progress.xp, 400);

        let fetched = remote.fetch_progress("u1").await.unwrap().unwrap();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn test_counters_beyond_i64_are_clamped() {
        let remote = SqliteRemote::open_in_memory().unwrap();
        let big = ProgressPayload {
            xp: u64::MAX,
            total_exercises_completed: i64::MAX as u64 + 1,
            ..payload()
        };

        let row = remote.sync_progress("u1", &big).await.unwrap();
        assert_eq!(row.progress.xp, i64::MAX as u64);
        assert_eq!(row.progress.total_exercises_completed, i64::MAX as u64);

        let fetched = remote.fetch_progress("u1").await.unwrap().unwrap();
        assert_eq!(fetched.progress.xp, i64::MAX as u64);
        assert!(fetched.progress.xp > payload().xp);
    }

    #[tokio::test]
    async fn test_badges_replace_only_earned() {
        let dir = tempdir().unwrap();
        let remote = SqliteRemote::open(&dir.path().join("remote.db")).unwrap();
        let date = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();

        let mut set = BadgeSet::default();
        set.earn(BadgeId::FirstLesson, date);
        set.earn(BadgeId::Streak3, date);
        let list: Vec<Badge> = set.into();

        let rows = remote.sync_badges("u1", &list).await.unwrap();
        assert_eq!(rows.len(), 2);

        // Idempotent
        remote.sync_badges("u1", &list).await.unwrap();
        let fetched = remote.fetch_badges("u1").await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].badge_id, "first_lesson");
        assert_eq!(fetched[0].earned_date, Some(date));

        // Other users untouched
        assert!(remote.fetch_badges("u2").await.unwrap().is_empty());
    }
}
