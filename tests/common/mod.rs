//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};

use lingo::clock::ManualClock;
use lingo::engine::{
    BadgeSet, Engine, ProgressRecord, ProgressionLedger, StreakState,
};
use lingo::storage::{BADGES_KEY, MemoryStore, PROGRESS_KEY, PersistentStore, encode_json};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 6, 19, 0, 0).unwrap()
}

pub async fn fresh_engine() -> (Engine<MemoryStore, ManualClock>, MemoryStore, ManualClock) {
    let store = MemoryStore::new();
    let clock = ManualClock::new(t0());
    let engine = Engine::load(store.clone(), clock.clone(), ProgressionLedger::default())
        .await
        .expect("Failed to load engine");
    (engine, store, clock)
}

/// Seed a store with a streak of `streak` days whose last activity was at `t0()`
pub async fn seed_streak(store: &MemoryStore, streak: u32, badges: &BadgeSet) {
    let ledger = ProgressionLedger::default();
    let record = ProgressRecord {
        progress: ledger.initial_state(),
        streak: StreakState {
            last_activity_timestamp: Some(t0()),
            current_streak: streak,
            longest_streak: streak,
            ..Default::default()
        },
        last_streak: streak.saturating_sub(1),
    };
    store
        .write(PROGRESS_KEY, &encode_json(PROGRESS_KEY, &record).unwrap())
        .await
        .expect("Failed to seed progress");
    store
        .write(BADGES_KEY, &encode_json(BADGES_KEY, badges).unwrap())
        .await
        .expect("Failed to seed badges");
}
