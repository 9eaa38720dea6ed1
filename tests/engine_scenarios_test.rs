//! End-to-end engine flows against an in-memory store and a manual clock

mod common;

use chrono::Duration;
use rand::SeedableRng;
use rand::rngs::StdRng;

use lingo::EngineError;
use lingo::clock::ManualClock;
use lingo::engine::{
    BadgeId, BadgeSet, Engine, EngineEvent, FreezeSource, ProgressionLedger, Rarity, RewardEngine,
    RewardSlot, RewardTable, RewardTier, RewardType, level_for_xp,
};
use lingo::storage::{BADGES_KEY, CHEST_KEY, MemoryStore, PROGRESS_KEY, PersistentStore};

use common::{fresh_engine, seed_streak, t0};

#[tokio::test]
async fn test_fresh_user_first_lesson() {
    let (mut engine, _, _) = fresh_engine().await;
    assert_eq!(engine.snapshot().streak.current_streak, 0);

    let events = engine.complete_lesson("basics-1", 70, 10, false).await.unwrap();
    let state = engine.snapshot();

    assert_eq!(state.streak.current_streak, 1);
    assert_eq!(state.progress.xp, 70);
    assert_eq!(state.progress.level, level_for_xp(70));
    assert_eq!(state.progress.level, 2);
    assert!(events.contains(&EngineEvent::StreakStarted));
    assert!(events.contains(&EngineEvent::LevelUp {
        old_level: 1,
        new_level: 2,
        title: "Newcomer",
    }));
}

#[tokio::test]
async fn test_seventh_day_reaches_gold_and_badge() {
    let store = MemoryStore::new();
    let mut badges = BadgeSet::default();
    badges.earn(BadgeId::Streak3, t0() - Duration::days(3));
    seed_streak(&store, 6, &badges).await;

    let clock = ManualClock::new(t0() + Duration::hours(30));
    let mut engine = Engine::load(store, clock, ProgressionLedger::default())
        .await
        .unwrap();

    let events = engine.complete_lesson("greetings", 20, 8, false).await.unwrap();
    assert_eq!(engine.snapshot().streak.current_streak, 7);
    assert_eq!(engine.snapshot().last_streak, 6);
    assert!(events.contains(&EngineEvent::StreakExtended { count: 7 }));
    assert!(events.contains(&EngineEvent::BadgeEarned(BadgeId::Streak7)));
    assert!(!events.contains(&EngineEvent::BadgeEarned(BadgeId::Streak3)));

    // 20 * 1.5 at a 7-day streak
    assert_eq!(engine.snapshot().progress.xp, 30);

    assert_eq!(engine.chest_view().next_rarity, Rarity::Gold);
    let mut rng = StdRng::seed_from_u64(7);
    let (reward, _) = engine.open_chest(RewardTier::Free, &mut rng).await.unwrap();
    assert_eq!(reward.rarity, Rarity::Gold);
    assert_ne!(reward.kind, RewardType::Discount);
}

#[tokio::test]
async fn test_same_day_activity_keeps_streak() {
    let (mut engine, _, clock) = fresh_engine().await;
    engine.complete_lesson("basics-1", 10, 1, false).await.unwrap();
    clock.advance(Duration::hours(5));
    let events = engine.complete_lesson("greetings", 10, 1, false).await.unwrap();

    assert_eq!(engine.snapshot().streak.current_streak, 1);
    assert!(!events.iter().any(|e| matches!(
        e,
        EngineEvent::StreakExtended { .. } | EngineEvent::StreakStarted
    )));
}

#[tokio::test]
async fn test_break_resets_but_keeps_longest() {
    let store = MemoryStore::new();
    seed_streak(&store, 4, &BadgeSet::default()).await;
    let clock = ManualClock::new(t0() + Duration::hours(48));
    let mut engine = Engine::load(store, clock, ProgressionLedger::default())
        .await
        .unwrap();

    let events = engine.complete_lesson("basics-1", 10, 1, false).await.unwrap();
    let streak = &engine.snapshot().streak;
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.longest_streak, 4);
    assert!(events.contains(&EngineEvent::StreakReset { previous: 4 }));
}

#[tokio::test]
async fn test_purchased_freeze_bridges_gap() {
    let store = MemoryStore::new();
    seed_streak(&store, 5, &BadgeSet::default()).await;
    let clock = ManualClock::new(t0() + Duration::hours(40));
    let mut engine = Engine::load(store, clock.clone(), ProgressionLedger::default())
        .await
        .unwrap();

    engine.purchase_freeze().await.unwrap();
    clock.set(t0() + Duration::hours(60));
    let events = engine.complete_lesson("basics-1", 10, 1, false).await.unwrap();

    let streak = &engine.snapshot().streak;
    assert_eq!(streak.current_streak, 6);
    assert!(!streak.freeze_active);
    assert!(events.contains(&EngineEvent::FreezeConsumed { count: 6 }));
}

#[tokio::test]
async fn test_streak_saver_arms_freeze() {
    let only_savers = vec![RewardSlot {
        kind: RewardType::StreakSaver,
        free_weight: 1,
        premium_weight: 1,
        free_values: (1, 1),
        premium_values: (1, 1),
    }];
    let table = RewardTable::new(only_savers.clone(), only_savers.clone(), only_savers);

    let (engine, store, _) = fresh_engine().await;
    let mut engine = engine.with_rewards(RewardEngine::new(table));
    let mut rng = StdRng::seed_from_u64(1);

    let (reward, events) = engine.open_chest(RewardTier::Free, &mut rng).await.unwrap();
    assert_eq!(reward.kind, RewardType::StreakSaver);
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::FreezeArmed {
            source: FreezeSource::ChestReward,
            ..
        }
    )));
    assert!(engine.snapshot().streak.freeze_active);
    assert!(store.raw(CHEST_KEY).is_some());
    assert!(store.raw(PROGRESS_KEY).is_some());
}

#[tokio::test]
async fn test_storage_failure_keeps_last_committed_state() {
    let (mut engine, store, clock) = fresh_engine().await;
    engine.complete_lesson("basics-1", 10, 1, false).await.unwrap();
    let committed = engine.snapshot().clone();
    let stored = store.raw(PROGRESS_KEY);

    store.set_fail_writes(true);
    clock.advance(Duration::hours(25));
    let err = engine.complete_lesson("basics-2", 10, 1, false).await.unwrap_err();
    assert!(matches!(err, EngineError::StorageFailure { .. }));
    assert_eq!(engine.snapshot(), &committed);
    assert_eq!(store.raw(PROGRESS_KEY), stored);

    let mut rng = StdRng::seed_from_u64(3);
    assert!(engine.open_chest(RewardTier::Free, &mut rng).await.is_err());
    assert!(engine.chest_view().is_available);

    store.set_fail_writes(false);
    engine.complete_lesson("basics-2", 10, 1, false).await.unwrap();
    assert_eq!(engine.snapshot().streak.current_streak, 2);
}

#[tokio::test]
async fn test_locked_and_unknown_lessons_rejected() {
    let (mut engine, _, _) = fresh_engine().await;

    let err = engine.complete_lesson("stories", 10, 1, false).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let err = engine.complete_lesson("klingon-1", 10, 1, false).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownEntity { .. }));

    assert_eq!(engine.snapshot().streak.current_streak, 0);
}

#[tokio::test]
async fn test_badges_earned_once() {
    let (mut engine, _, clock) = fresh_engine().await;
    let first = engine.complete_lesson("basics-1", 10, 1, true).await.unwrap();
    assert!(first.contains(&EngineEvent::BadgeEarned(BadgeId::FirstLesson)));

    clock.advance(Duration::hours(1));
    let again = engine.complete_lesson("basics-1", 10, 1, true).await.unwrap();
    assert!(!again.iter().any(|e| matches!(e, EngineEvent::BadgeEarned(_))));

    let badge = engine.snapshot().badges.get(BadgeId::FirstLesson).unwrap();
    assert_eq!(badge.earned_date, Some(t0()));
}

#[tokio::test]
async fn test_load_skips_badges_from_other_builds() {
    let store = MemoryStore::new();
    let doc = r#"[{"id":"first_lesson","earned":true,"earnedDate":"2026-07-01T10:00:00Z"},{"id":"from_newer_build","earned":true,"earnedDate":"2026-07-02T10:00:00Z"}]"#;
    store.write(BADGES_KEY, doc).await.unwrap();

    let engine = Engine::load(store.clone(), ManualClock::new(t0()), ProgressionLedger::default())
        .await
        .unwrap();
    let badges = &engine.snapshot().badges;
    assert_eq!(badges.earned_count(), 1);
    assert!(badges.is_earned(BadgeId::FirstLesson));
}

#[tokio::test]
async fn test_huge_scores_saturate_xp() {
    let (mut engine, _, clock) = fresh_engine().await;
    engine.complete_lesson("basics-1", u64::MAX, u64::MAX, false).await.unwrap();
    let after_first = engine.snapshot().progress.xp;
    assert_eq!(after_first, u64::MAX);

    clock.advance(Duration::hours(1));
    engine.complete_lesson("basics-1", 10, 5, false).await.unwrap();
    let progress = &engine.snapshot().progress;
    assert_eq!(progress.xp, u64::MAX);
    assert_eq!(progress.total_exercises_completed, u64::MAX);
}
