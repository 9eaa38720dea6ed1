//! Pull, merge, push
//!
//! The coordinator never touches local storage. It hands the reconciled
//! snapshot back to the caller once both upserts are confirmed, so dropping a
//! sync future mid-flight leaves local state exactly as it was.

use chrono::{DateTime, Utc};
use futures::future::try_join;
use tracing::{debug, info};

use super::merge::merge;
use super::remote::{ProgressPayload, RemoteStore, snapshot_from_remote};
use crate::engine::{AchievementEvaluator, Badge, BadgeId, LessonId, ProgressionLedger, UserSnapshot};
use crate::error::{EngineError, Result};

/// Result of a completed round trip
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub snapshot: UserSnapshot,
    /// Badges first earned during reconciliation
    pub newly_earned: Vec<BadgeId>,
    pub newly_unlocked: Vec<LessonId>,
    pub pushed_badges: usize,
}

pub struct SyncCoordinator<R> {
    remote: R,
    user_id: String,
}

impl<R: RemoteStore> SyncCoordinator<R> {
    pub fn new(remote: R, user_id: impl Into<String>) -> Self {
        Self {
            remote,
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Fetch the remote copy as a full snapshot
    pub async fn pull(&self) -> Result<UserSnapshot> {
        let (progress, badges) = try_join(
            self.remote.fetch_progress(&self.user_id),
            self.remote.fetch_badges(&self.user_id),
        )
        .await?;
        debug!(
            user_id = %self.user_id,
            has_progress = progress.is_some(),
            badges = badges.len(),
            "Pulled remote state"
        );
        Ok(snapshot_from_remote(progress.as_ref(), &badges))
    }

    /// Merge two snapshots, then re-derive level, unlocks and badges
    pub fn reconcile(
        ledger: &ProgressionLedger,
        local: &UserSnapshot,
        remote: &UserSnapshot,
        now: DateTime<Utc>,
    ) -> SyncOutcome {
        let merged = merge(local, remote);
        let (progress, newly_unlocked) = ledger.normalize(&merged.progress);
        let (badges, newly_earned) =
            AchievementEvaluator::evaluate(&progress, &merged.streak, &merged.badges, now);

        SyncOutcome {
            snapshot: UserSnapshot {
                progress,
                badges,
                ..merged
            },
            newly_earned,
            newly_unlocked,
            pushed_badges: 0,
        }
    }

    /// One full round trip; the caller persists `snapshot` afterwards
    pub async fn sync(
        &self,
        ledger: &ProgressionLedger,
        local: &UserSnapshot,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        if self.user_id.is_empty() {
            return Err(EngineError::sync("no user id configured"));
        }

        let remote = self.pull().await?;
        let mut outcome = Self::reconcile(ledger, local, &remote, now);

        let payload = ProgressPayload::from_snapshot(&outcome.snapshot);
        let badges: Vec<Badge> = outcome.snapshot.badges.earned().cloned().collect();
        let (row, inserted) = try_join(
            self.remote.sync_progress(&self.user_id, &payload),
            self.remote.sync_badges(&self.user_id, &badges),
        )
        .await?;

        outcome.pushed_badges = inserted.len();
        info!(
            user_id = %self.user_id,
            xp = row.progress.xp,
            streak = row.progress.streak,
            badges = outcome.pushed_badges,
            "Sync complete"
        );
        Ok(outcome)
    }
}
