//! Daily chest rewards
//!
//! Rarity follows the streak length. Within a rarity the reward type is drawn
//! from a weighted table; premium users get bigger amounts and the `discount`
//! type, which free users never receive.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};

/// Hours between two chest openings
pub const CHEST_WINDOW_HOURS: i64 = 24;

/// Chest rarity, ordered from lowest to highest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    #[default]
    Regular,
    Silver,
    Gold,
}

impl Rarity {
    /// Rarity earned by a streak of the given length
    pub fn for_streak(streak: u32) -> Self {
        if streak >= 7 {
            Self::Gold
        } else if streak >= 3 {
            Self::Silver
        } else {
            Self::Regular
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }
}

/// Subscription tier of the user opening the chest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTier {
    #[default]
    Free,
    Premium,
}

impl RewardTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Coins,
    Phrase,
    Boost,
    Discount,
    StreakSaver,
    Badge,
}

impl RewardType {
    pub const ALL: [RewardType; 6] = [
        Self::Coins,
        Self::Phrase,
        Self::Boost,
        Self::Discount,
        Self::StreakSaver,
        Self::Badge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coins => "coins",
            Self::Phrase => "phrase",
            Self::Boost => "boost",
            Self::Discount => "discount",
            Self::StreakSaver => "streak_saver",
            Self::Badge => "badge",
        }
    }

    /// Only premium users can receive this type
    pub fn is_premium_only(&self) -> bool {
        matches!(self, Self::Discount)
    }

    fn describe(&self, value: u32) -> String {
        match self {
            Self::Coins => format!("{} coins", value),
            Self::Phrase if value == 1 => "1 bonus phrase unlocked".to_string(),
            Self::Phrase => format!("{} bonus phrases unlocked", value),
            Self::Boost => format!("Double XP for {} minutes", value),
            Self::Discount => format!("{}% off your next Premium month", value),
            Self::StreakSaver => "Streak freeze".to_string(),
            Self::Badge => "Collector badge".to_string(),
        }
    }
}

/// A drawn reward. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    #[serde(rename = "type")]
    pub kind: RewardType,
    pub rarity: Rarity,
    /// Amount in the type's unit (coins, phrases, minutes, percent, count)
    pub value: u32,
    pub description: String,
}

/// One row of the reward table
#[derive(Debug, Clone, Copy)]
pub struct RewardSlot {
    pub kind: RewardType,
    pub free_weight: u32,
    pub premium_weight: u32,
    pub free_values: (u32, u32),
    pub premium_values: (u32, u32),
}

impl RewardSlot {
    fn weight(&self, tier: RewardTier) -> u32 {
        match tier {
            RewardTier::Free if self.kind.is_premium_only() => 0,
            RewardTier::Free => self.free_weight,
            RewardTier::Premium => self.premium_weight,
        }
    }

    fn values(&self, tier: RewardTier) -> (u32, u32) {
        match tier {
            RewardTier::Free => self.free_values,
            RewardTier::Premium => self.premium_values,
        }
    }
}

const fn slot(
    kind: RewardType,
    free_weight: u32,
    premium_weight: u32,
    free_values: (u32, u32),
    premium_values: (u32, u32),
) -> RewardSlot {
    RewardSlot {
        kind,
        free_weight,
        premium_weight,
        free_values,
        premium_values,
    }
}

static REGULAR_TABLE: &[RewardSlot] = &[
    slot(RewardType::Coins, 50, 45, (10, 25), (20, 40)),
    slot(RewardType::Phrase, 25, 22, (1, 1), (1, 2)),
    slot(RewardType::Boost, 15, 13, (15, 15), (15, 30)),
    slot(RewardType::Discount, 0, 10, (0, 0), (10, 15)),
    slot(RewardType::StreakSaver, 8, 8, (1, 1), (1, 1)),
    slot(RewardType::Badge, 2, 2, (1, 1), (1, 1)),
];

static SILVER_TABLE: &[RewardSlot] = &[
    slot(RewardType::Coins, 45, 40, (25, 50), (40, 80)),
    slot(RewardType::Phrase, 22, 18, (2, 3), (2, 4)),
    slot(RewardType::Boost, 18, 15, (30, 30), (30, 45)),
    slot(RewardType::Discount, 0, 12, (0, 0), (15, 25)),
    slot(RewardType::StreakSaver, 10, 10, (1, 1), (1, 1)),
    slot(RewardType::Badge, 5, 5, (1, 1), (1, 1)),
];

static GOLD_TABLE: &[RewardSlot] = &[
    slot(RewardType::Coins, 40, 35, (50, 100), (80, 150)),
    slot(RewardType::Phrase, 20, 16, (3, 5), (4, 6)),
    slot(RewardType::Boost, 18, 14, (60, 60), (60, 90)),
    slot(RewardType::Discount, 0, 15, (0, 0), (25, 40)),
    slot(RewardType::StreakSaver, 12, 12, (1, 1), (1, 1)),
    slot(RewardType::Badge, 10, 8, (1, 1), (1, 1)),
];

/// Weighted reward tables, one per rarity
#[derive(Debug, Clone)]
pub struct RewardTable {
    regular: Vec<RewardSlot>,
    silver: Vec<RewardSlot>,
    gold: Vec<RewardSlot>,
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            regular: REGULAR_TABLE.to_vec(),
            silver: SILVER_TABLE.to_vec(),
            gold: GOLD_TABLE.to_vec(),
        }
    }
}

impl RewardTable {
    pub fn new(regular: Vec<RewardSlot>, silver: Vec<RewardSlot>, gold: Vec<RewardSlot>) -> Self {
        Self {
            regular,
            silver,
            gold,
        }
    }

    pub fn slots(&self, rarity: Rarity) -> &[RewardSlot] {
        match rarity {
            Rarity::Regular => &self.regular,
            Rarity::Silver => &self.silver,
            Rarity::Gold => &self.gold,
        }
    }

    /// Probability of drawing `kind` at the given rarity and tier
    pub fn probability(&self, rarity: Rarity, tier: RewardTier, kind: RewardType) -> f64 {
        let slots = self.slots(rarity);
        let total: u32 = slots.iter().map(|s| s.weight(tier)).sum();
        if total == 0 {
            return 0.0;
        }
        let weight: u32 = slots
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.weight(tier))
            .sum();
        weight as f64 / total as f64
    }
}

/// Derived and persisted chest data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChestState {
    pub last_opened_timestamp: Option<DateTime<Utc>>,
    /// Stored for the UI only, always recomputed on read
    pub is_available: bool,
    pub current_streak: u32,
    pub next_rarity: Rarity,
}

impl ChestState {
    /// Whether the chest can be opened at `now`
    pub fn available_at(&self, now: DateTime<Utc>) -> bool {
        match self.last_opened_timestamp {
            Some(last) => now - last >= Duration::hours(CHEST_WINDOW_HOURS),
            None => true,
        }
    }

    /// Copy with the derived fields recomputed
    pub fn refreshed(&self, streak: u32, now: DateTime<Utc>) -> ChestState {
        ChestState {
            last_opened_timestamp: self.last_opened_timestamp,
            is_available: self.available_at(now),
            current_streak: streak,
            next_rarity: Rarity::for_streak(streak),
        }
    }

    /// When the chest becomes available again (None if it already is)
    pub fn next_available_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.available_at(now) {
            return None;
        }
        self.last_opened_timestamp
            .map(|last| last + Duration::hours(CHEST_WINDOW_HOURS))
    }
}

/// Draws chest rewards from a [`RewardTable`]
#[derive(Debug, Clone, Default)]
pub struct RewardEngine {
    table: RewardTable,
}

impl RewardEngine {
    pub fn new(table: RewardTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RewardTable {
        &self.table
    }

    /// Draw a reward for a streak length and tier
    pub fn draw<R: Rng>(&self, streak: u32, tier: RewardTier, rng: &mut R) -> Reward {
        let rarity = Rarity::for_streak(streak);
        let slots = self.table.slots(rarity);
        let total: u32 = slots.iter().map(|s| s.weight(tier)).sum();

        // Tables always carry coins for both tiers, an empty table falls back to them
        let chosen = if total == 0 {
            None
        } else {
            let mut roll = rng.random_range(0..total);
            slots.iter().find(|s| {
                let weight = s.weight(tier);
                if roll < weight {
                    true
                } else {
                    roll -= weight;
                    false
                }
            })
        };

        let (kind, (min, max)) = match chosen {
            Some(slot) => (slot.kind, slot.values(tier)),
            None => (RewardType::Coins, (10, 10)),
        };
        let value = if min >= max {
            min
        } else {
            rng.random_range(min..=max)
        };

        Reward {
            kind,
            rarity,
            value,
            description: kind.describe(value),
        }
    }

    /// Open the daily chest, consuming availability until the next window
    pub fn open_chest<R: Rng>(
        &self,
        chest: &ChestState,
        streak: u32,
        tier: RewardTier,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<(ChestState, Reward)> {
        if !chest.available_at(now) {
            return Err(EngineError::invalid_state(
                "daily chest has already been opened",
            ));
        }

        let reward = self.draw(streak, tier, rng);
        debug!(
            rarity = reward.rarity.as_str(),
            kind = reward.kind.as_str(),
            value = reward.value,
            "Daily chest opened"
        );

        let opened = ChestState {
            last_opened_timestamp: Some(now),
            ..ChestState::default()
        };
        Ok((opened.refreshed(streak, now), reward))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_rarity_steps() {
        assert_eq!(Rarity::for_streak(0), Rarity::Regular);
        assert_eq!(Rarity::for_streak(2), Rarity::Regular);
        assert_eq!(Rarity::for_streak(3), Rarity::Silver);
        assert_eq!(Rarity::for_streak(6), Rarity::Silver);
        assert_eq!(Rarity::for_streak(7), Rarity::Gold);
        assert_eq!(Rarity::for_streak(365), Rarity::Gold);
    }

    #[test]
    fn test_rarity_monotonic_in_streak() {
        let engine = RewardEngine::default();
        let mut rng = StdRng::seed_from_u64(7);
        for tier in [RewardTier::Free, RewardTier::Premium] {
            let mut previous = Rarity::Regular;
            for streak in 0..60 {
                let reward = engine.draw(streak, tier, &mut rng);
                assert!(reward.rarity >= previous);
                previous = reward.rarity;
            }
        }
    }

    #[test]
    fn test_free_tier_never_gets_discount() {
        let engine = RewardEngine::default();
        let mut rng = StdRng::seed_from_u64(42);
        for i in 0..3000 {
            let reward = engine.draw(i % 12, RewardTier::Free, &mut rng);
            assert_ne!(reward.kind, RewardType::Discount);
        }
    }

    #[test]
    fn test_premium_can_get_discount() {
        let engine = RewardEngine::default();
        let mut rng = StdRng::seed_from_u64(42);
        let got_discount = (0..3000)
            .map(|_| engine.draw(8, RewardTier::Premium, &mut rng))
            .any(|r| r.kind == RewardType::Discount);
        assert!(got_discount);
    }

    #[test]
    fn test_draw_is_reproducible() {
        let engine = RewardEngine::default();
        let a: Vec<Reward> = {
            let mut rng = StdRng::seed_from_u64(99);
            (0..20).map(|s| engine.draw(s, RewardTier::Premium, &mut rng)).collect()
        };
        let b: Vec<Reward> = {
            let mut rng = StdRng::seed_from_u64(99);
            (0..20).map(|s| engine.draw(s, RewardTier::Premium, &mut rng)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_coins_most_likely_badge_rarest() {
        let table = RewardTable::default();
        for rarity in [Rarity::Regular, Rarity::Silver, Rarity::Gold] {
            for tier in [RewardTier::Free, RewardTier::Premium] {
                let coins = table.probability(rarity, tier, RewardType::Coins);
                let badge = table.probability(rarity, tier, RewardType::Badge);
                for slot in table.slots(rarity) {
                    let p = table.probability(rarity, tier, slot.kind);
                    assert!(coins >= p);
                    if p > 0.0 {
                        assert!(badge <= p);
                    }
                }
            }
        }
    }

    #[test]
    fn test_premium_coin_amounts_higher() {
        let table = RewardTable::default();
        for rarity in [Rarity::Regular, Rarity::Silver, Rarity::Gold] {
            let coins = table
                .slots(rarity)
                .iter()
                .find(|s| s.kind == RewardType::Coins)
                .unwrap();
            assert!(coins.premium_values.0 > coins.free_values.0);
            assert!(coins.premium_values.1 > coins.free_values.1);
        }
    }

    #[test]
    fn test_chest_opens_once_per_window() {
        let engine = RewardEngine::default();
        let mut rng = StdRng::seed_from_u64(1);
        let t0 = Utc.with_ymd_and_hms(2026, 2, 10, 18, 0, 0).unwrap();

        let chest = ChestState::default();
        assert!(chest.available_at(t0));

        let (opened, reward) = engine
            .open_chest(&chest, 7, RewardTier::Free, t0, &mut rng)
            .unwrap();
        assert_eq!(reward.rarity, Rarity::Gold);
        assert!(!opened.is_available);
        assert_eq!(opened.next_rarity, Rarity::Gold);
        assert_eq!(opened.next_available_at(t0), Some(t0 + Duration::hours(24)));

        let err = engine
            .open_chest(&opened, 7, RewardTier::Free, t0 + Duration::hours(23), &mut rng)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));

        let later = t0 + Duration::hours(24);
        assert!(opened.refreshed(7, later).is_available);
        assert!(engine.open_chest(&opened, 7, RewardTier::Free, later, &mut rng).is_ok());
    }
}
