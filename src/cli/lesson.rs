//! Lesson completion command

use anyhow::Result;

use lingo::config::Config;
use lingo::engine::{BadgeDefinition, EngineEvent};

/// Record a finished lesson and print what happened
pub async fn complete_command(
    config: &Config,
    lesson_id: &str,
    score: u64,
    exercises: u64,
    perfect: bool,
) -> Result<()> {
    let mut engine = super::open_engine(config).await?;
    let events = engine
        .complete_lesson(lesson_id, score, exercises, perfect)
        .await?;

    for event in &events {
        print_event(event);
    }
    Ok(())
}

pub fn print_event(event: &EngineEvent) {
    match event {
        EngineEvent::StreakStarted => println!("Streak started: day 1"),
        EngineEvent::StreakExtended { count } => println!("Streak extended: {} days", count),
        EngineEvent::StreakReset { previous } => {
            println!("Streak lost after {} day(s), starting over", previous)
        }
        EngineEvent::FreezeConsumed { count } => {
            println!("Streak freeze used, streak saved at {} days", count)
        }
        EngineEvent::FreezeArmed { source, expires_at } => match expires_at {
            Some(at) => println!(
                "Streak freeze armed ({}) until {}",
                source.as_str(),
                at.format("%Y-%m-%d %H:%M UTC")
            ),
            None => println!("Streak freeze armed ({})", source.as_str()),
        },
        EngineEvent::XpAwarded {
            lesson_id,
            amount,
            multiplier,
        } => {
            if *multiplier > 1.0 {
                println!("+{} XP for {} (x{:.1} streak bonus)", amount, lesson_id, multiplier);
            } else {
                println!("+{} XP for {}", amount, lesson_id);
            }
        }
        EngineEvent::LevelUp {
            old_level,
            new_level,
            title,
        } => println!("Level up! {} -> {} ({})", old_level, new_level, title),
        EngineEvent::LessonsUnlocked(ids) => println!("Unlocked: {}", ids.join(", ")),
        EngineEvent::BadgeEarned(id) => match BadgeDefinition::get(*id) {
            Some(def) => println!("Badge earned: {} {} - {}", def.icon, def.name, def.description),
            None => println!("Badge earned: {}", id),
        },
        EngineEvent::ChestOpened(reward) => {
            println!("Chest ({}): {}", reward.rarity.as_str(), reward.description)
        }
        EngineEvent::Synced { pushed_badges } => {
            println!("Synced ({} badge(s) on remote)", pushed_badges)
        }
    }
}
