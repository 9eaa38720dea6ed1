//! Daily chest and streak freeze commands

use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;

use lingo::config::Config;
use lingo::engine::{Rarity, RewardTable, RewardTier, RewardType};

use super::lesson::print_event;

/// Show the chest and its odds, or open it with `--open`
pub async fn chest_command(config: &Config, open: bool, premium: bool, seed: Option<u64>) -> Result<()> {
    let mut engine = super::open_engine(config).await?;
    let tier = if premium {
        RewardTier::Premium
    } else {
        config.chest.tier
    };

    if !open {
        let chest = engine.chest_view();
        if chest.is_available {
            println!(
                "Daily chest is ready: {} (streak {})",
                chest.next_rarity.as_str(),
                chest.current_streak
            );
        } else if let Some(at) = chest.next_available_at(engine.now()) {
            println!("Daily chest already opened, next one at {}", at.format("%Y-%m-%d %H:%M UTC"));
        }
        println!("\nOdds ({} tier):", tier.as_str());
        print_odds(engine.rewards().table(), chest.next_rarity, tier);
        return Ok(());
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let (_, events) = engine.open_chest(tier, &mut rng).await?;
    for event in &events {
        print_event(event);
    }
    Ok(())
}

fn print_odds(table: &RewardTable, rarity: Rarity, tier: RewardTier) {
    for kind in RewardType::ALL {
        let p = table.probability(rarity, tier, kind);
        if p > 0.0 {
            println!("  {:<13} {:>5.1}%", kind.as_str(), p * 100.0);
        }
    }
}

/// Arm a purchased streak freeze
pub async fn freeze_command(config: &Config) -> Result<()> {
    let mut engine = super::open_engine(config).await?;
    for event in engine.purchase_freeze().await? {
        print_event(&event);
    }
    Ok(())
}
