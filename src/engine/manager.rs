//! Engine - composition root
//!
//! Owns the in-memory snapshot together with the injected store and clock.
//! Every operation computes a new snapshot from the current one, persists it,
//! and only then swaps it in. A failed write leaves the engine on its last
//! committed state.

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use super::catalog::LessonId;
use super::checker::{AchievementEvaluator, BadgeSet};
use super::definitions::BadgeId;
use super::levels::Level;
use super::progression::{ProgressionLedger, scaled_score, streak_multiplier};
use super::rewards::{ChestState, Reward, RewardEngine, RewardTier, RewardType};
use super::state::{ProgressRecord, UserSnapshot};
use super::streaks::{FreezeSource, StreakChange, StreakTracker};
use crate::clock::ClockSource;
use crate::error::Result;
use crate::storage::{BADGES_KEY, CHEST_KEY, PROGRESS_KEY, PersistentStore, encode_json, read_json};
use crate::sync::{RemoteStore, SyncCoordinator};

/// Something the UI may want to react to
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StreakStarted,
    StreakExtended { count: u32 },
    StreakReset { previous: u32 },
    FreezeConsumed { count: u32 },
    FreezeArmed {
        source: FreezeSource,
        expires_at: Option<DateTime<Utc>>,
    },
    XpAwarded {
        lesson_id: LessonId,
        amount: u64,
        multiplier: f64,
    },
    LevelUp {
        old_level: u32,
        new_level: u32,
        title: &'static str,
    },
    LessonsUnlocked(Vec<LessonId>),
    BadgeEarned(BadgeId),
    ChestOpened(Reward),
    Synced { pushed_badges: usize },
}

impl EngineEvent {
    fn from_streak_change(change: StreakChange) -> Option<Self> {
        match change {
            StreakChange::Unchanged => None,
            StreakChange::Started => Some(Self::StreakStarted),
            StreakChange::Extended { count } => Some(Self::StreakExtended { count }),
            StreakChange::FreezeConsumed { count } => Some(Self::FreezeConsumed { count }),
            StreakChange::Reset { previous } => Some(Self::StreakReset { previous }),
        }
    }
}

/// Which documents a commit touches
#[derive(Debug, Clone, Copy, Default)]
struct Dirty {
    progress: bool,
    badges: bool,
    chest: bool,
}

pub struct Engine<S, C> {
    store: S,
    clock: C,
    ledger: ProgressionLedger,
    rewards: RewardEngine,
    state: UserSnapshot,
    chest: ChestState,
}

impl<S: PersistentStore, C: ClockSource> Engine<S, C> {
    /// Load the three documents, falling back to a fresh user for missing keys
    pub async fn load(store: S, clock: C, ledger: ProgressionLedger) -> Result<Self> {
        let record: Option<ProgressRecord> = read_json(&store, PROGRESS_KEY).await?;
        let badges: Option<BadgeSet> = read_json(&store, BADGES_KEY).await?;
        let chest: Option<ChestState> = read_json(&store, CHEST_KEY).await?;

        let mut state = UserSnapshot {
            progress: ledger.initial_state(),
            badges: badges.unwrap_or_default(),
            ..Default::default()
        };
        if let Some(record) = record {
            // Stored documents may predate catalog changes
            let (progress, _) = ledger.normalize(&record.progress);
            state.progress = progress;
            state.streak = record.streak;
            state.last_streak = record.last_streak;
        }

        debug!(
            xp = state.progress.xp,
            streak = state.streak.current_streak,
            badges = state.badges.earned_count(),
            "Engine loaded"
        );

        Ok(Self {
            store,
            clock,
            ledger,
            rewards: RewardEngine::default(),
            state,
            chest: chest.unwrap_or_default(),
        })
    }

    pub fn with_rewards(mut self, rewards: RewardEngine) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn snapshot(&self) -> &UserSnapshot {
        &self.state
    }

    pub fn ledger(&self) -> &ProgressionLedger {
        &self.ledger
    }

    pub fn rewards(&self) -> &RewardEngine {
        &self.rewards
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Streak as it counts right now: zero once it can no longer be continued
    pub fn effective_streak(&self) -> u32 {
        if self.state.streak.is_active(self.now()) {
            self.state.streak.current_streak
        } else {
            0
        }
    }

    /// Chest with availability and rarity recomputed for the current time
    pub fn chest_view(&self) -> ChestState {
        self.chest.refreshed(self.effective_streak(), self.now())
    }

    /// Progress towards every badge not yet earned
    pub fn badge_progress(&self) -> Vec<(BadgeId, u64, u64)> {
        AchievementEvaluator::progress(&self.state.progress, &self.state.streak, &self.state.badges)
    }

    /// Record a finished lesson: streak, XP, unlocks, then badges
    pub async fn complete_lesson(
        &mut self,
        lesson_id: &str,
        base_score: u64,
        exercise_count: u64,
        is_perfect: bool,
    ) -> Result<Vec<EngineEvent>> {
        let now = self.now();
        let (streak, change) = StreakTracker::apply(&self.state.streak, now);
        let multiplier = streak_multiplier(streak.current_streak);
        let score = scaled_score(base_score, streak.current_streak);

        let outcome = self.ledger.complete_lesson(
            &self.state.progress,
            lesson_id,
            score,
            exercise_count,
            is_perfect,
        )?;
        let (badges, newly_earned) =
            AchievementEvaluator::evaluate(&outcome.state, &streak, &self.state.badges, now);

        let last_streak = if change == StreakChange::Unchanged {
            self.state.last_streak
        } else {
            self.state.streak.current_streak
        };
        let next = UserSnapshot {
            progress: outcome.state.clone(),
            streak,
            last_streak,
            badges,
        };

        self.commit(
            next,
            None,
            Dirty {
                progress: true,
                badges: !newly_earned.is_empty(),
                chest: false,
            },
        )
        .await?;

        info!(
            lesson_id,
            xp = outcome.xp_awarded,
            streak = self.state.streak.current_streak,
            "Lesson recorded"
        );

        let mut events: Vec<EngineEvent> = EngineEvent::from_streak_change(change).into_iter().collect();
        events.push(EngineEvent::XpAwarded {
            lesson_id: lesson_id.to_string(),
            amount: outcome.xp_awarded,
            multiplier,
        });
        if outcome.leveled_up() {
            events.push(EngineEvent::LevelUp {
                old_level: outcome.previous_level,
                new_level: outcome.state.level,
                title: Level::for_xp(outcome.state.xp).title,
            });
        }
        if !outcome.newly_unlocked.is_empty() {
            events.push(EngineEvent::LessonsUnlocked(outcome.newly_unlocked));
        }
        events.extend(newly_earned.into_iter().map(EngineEvent::BadgeEarned));
        Ok(events)
    }

    /// Open the daily chest. A streak saver arms a freeze right away.
    pub async fn open_chest<R: Rng>(
        &mut self,
        tier: RewardTier,
        rng: &mut R,
    ) -> Result<(Reward, Vec<EngineEvent>)> {
        let now = self.now();
        let streak = self.effective_streak();
        let (chest, reward) = self.rewards.open_chest(&self.chest, streak, tier, now, rng)?;

        let mut next = self.state.clone();
        let mut events = vec![EngineEvent::ChestOpened(reward.clone())];
        let mut dirty = Dirty {
            chest: true,
            ..Default::default()
        };

        if reward.kind == RewardType::StreakSaver {
            if next.streak.freeze_protects(now) {
                debug!("Streak saver drawn with a freeze already armed");
            } else {
                next.streak = StreakTracker::purchase_freeze(&next.streak, now, FreezeSource::ChestReward)?;
                dirty.progress = true;
                events.push(EngineEvent::FreezeArmed {
                    source: FreezeSource::ChestReward,
                    expires_at: next.streak.freeze_expires_at,
                });
            }
        }

        self.commit(next, Some(chest), dirty).await?;
        info!(
            rarity = reward.rarity.as_str(),
            kind = reward.kind.as_str(),
            value = reward.value,
            "Chest reward granted"
        );
        Ok((reward, events))
    }

    /// Arm a purchased streak freeze
    pub async fn purchase_freeze(&mut self) -> Result<Vec<EngineEvent>> {
        let now = self.now();
        let mut next = self.state.clone();
        next.streak = StreakTracker::purchase_freeze(&self.state.streak, now, FreezeSource::Purchase)?;
        let expires_at = next.streak.freeze_expires_at;

        self.commit(
            next,
            None,
            Dirty {
                progress: true,
                ..Default::default()
            },
        )
        .await?;

        Ok(vec![EngineEvent::FreezeArmed {
            source: FreezeSource::Purchase,
            expires_at,
        }])
    }

    /// Round trip with the remote, then persist the reconciled snapshot locally
    pub async fn sync<R: RemoteStore>(&mut self, coordinator: &SyncCoordinator<R>) -> Result<Vec<EngineEvent>> {
        let now = self.now();
        let outcome = match coordinator.sync(&self.ledger, &self.state, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Sync failed, keeping local state");
                return Err(e);
            }
        };

        self.commit(
            outcome.snapshot,
            None,
            Dirty {
                progress: true,
                badges: true,
                chest: false,
            },
        )
        .await?;

        let mut events = Vec::new();
        if !outcome.newly_unlocked.is_empty() {
            events.push(EngineEvent::LessonsUnlocked(outcome.newly_unlocked));
        }
        events.extend(outcome.newly_earned.into_iter().map(EngineEvent::BadgeEarned));
        events.push(EngineEvent::Synced {
            pushed_badges: outcome.pushed_badges,
        });
        Ok(events)
    }

    /// Persist the touched documents, then swap the new state in
    async fn commit(&mut self, next: UserSnapshot, chest: Option<ChestState>, dirty: Dirty) -> Result<()> {
        let mut entries: Vec<(&str, String)> = Vec::with_capacity(3);
        if dirty.progress {
            entries.push((PROGRESS_KEY, encode_json(PROGRESS_KEY, &next.progress_record())?));
        }
        if dirty.badges {
            entries.push((BADGES_KEY, encode_json(BADGES_KEY, &next.badges)?));
        }
        if let Some(chest) = chest.as_ref().filter(|_| dirty.chest) {
            entries.push((CHEST_KEY, encode_json(CHEST_KEY, chest)?));
        }

        if let Err(e) = self.store.write_batch(&entries).await {
            warn!(error = %e, keys = entries.len(), "Write failed, keeping last committed state");
            return Err(e);
        }

        self.state = next;
        if let Some(chest) = chest {
            self.chest = chest;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::EngineError;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    async fn engine() -> (Engine<MemoryStore, ManualClock>, MemoryStore, ManualClock) {
        let store = MemoryStore::new();
        let clock = ManualClock::new(start());
        let engine = Engine::load(store.clone(), clock.clone(), ProgressionLedger::default())
            .await
            .unwrap();
        (engine, store, clock)
    }

    #[tokio::test]
    async fn test_first_lesson_events() {
        let (mut engine, store, _) = engine().await;
        let events = engine.complete_lesson("basics-1", 40, 12, true).await.unwrap();

        assert_eq!(events[0], EngineEvent::StreakStarted);
        assert!(events.contains(&EngineEvent::XpAwarded {
            lesson_id: "basics-1".into(),
            amount: 40,
            multiplier: 1.0,
        }));
        assert!(events.contains(&EngineEvent::LessonsUnlocked(vec!["basics-2".into()])));
        assert!(events.contains(&EngineEvent::BadgeEarned(BadgeId::FirstLesson)));
        assert!(events.contains(&EngineEvent::BadgeEarned(BadgeId::Perfect1)));

        assert!(store.raw(PROGRESS_KEY).is_some());
        assert!(store.raw(BADGES_KEY).is_some());
        assert!(store.raw(CHEST_KEY).is_none());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_state() {
        let (mut engine, store, _) = engine().await;
        engine.complete_lesson("basics-1", 40, 12, false).await.unwrap();
        let before = engine.snapshot().clone();

        store.set_fail_writes(true);
        let err = engine.complete_lesson("greetings", 40, 12, false).await.unwrap_err();
        assert!(matches!(err, EngineError::StorageFailure { .. }));
        assert_eq!(engine.snapshot(), &before);
    }

    #[tokio::test]
    async fn test_reload_restores_snapshot() {
        let (mut engine, store, clock) = engine().await;
        engine.complete_lesson("basics-1", 40, 12, false).await.unwrap();
        clock.advance(Duration::hours(26));
        engine.complete_lesson("greetings", 40, 12, false).await.unwrap();

        let reloaded = Engine::load(store, clock, ProgressionLedger::default())
            .await
            .unwrap();
        assert_eq!(reloaded.snapshot(), engine.snapshot());
        assert_eq!(reloaded.snapshot().last_streak, 1);
    }

    #[tokio::test]
    async fn test_chest_once_per_window() {
        let (mut engine, _, clock) = engine().await;
        let mut rng = StdRng::seed_from_u64(11);

        assert!(engine.chest_view().is_available);
        engine.open_chest(RewardTier::Free, &mut rng).await.unwrap();
        assert!(!engine.chest_view().is_available);

        let err = engine.open_chest(RewardTier::Free, &mut rng).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));

        clock.advance(Duration::hours(24));
        assert!(engine.chest_view().is_available);
    }

    #[tokio::test]
    async fn test_purchase_freeze_twice_fails() {
        let (mut engine, _, _) = engine().await;
        let events = engine.purchase_freeze().await.unwrap();
        assert!(matches!(
            events[0],
            EngineEvent::FreezeArmed {
                source: FreezeSource::Purchase,
                ..
            }
        ));
        assert!(engine.purchase_freeze().await.is_err());
    }

    #[tokio::test]
    async fn test_stale_streak_reads_as_zero() {
        let (mut engine, _, clock) = engine().await;
        engine.complete_lesson("basics-1", 10, 1, false).await.unwrap();
        assert_eq!(engine.effective_streak(), 1);

        clock.advance(Duration::hours(49));
        assert_eq!(engine.effective_streak(), 0);
        assert_eq!(engine.chest_view().current_streak, 0);
    }
}
