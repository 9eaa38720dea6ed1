//! Badges command implementation

use anyhow::Result;

use lingo::config::Config;
use lingo::engine::{BADGES, BadgeCategory};

/// List earned badges, then progress on the rest grouped by category
pub async fn badges_command(config: &Config) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let badges = &engine.snapshot().badges;

    println!("Earned ({}/{}):", badges.earned_count(), BADGES.len());
    for badge in badges.earned() {
        let Some(def) = badge.definition() else {
            continue;
        };
        let date = badge
            .earned_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!("  {} {:<18} {}", def.icon, def.name, date);
    }

    let progress = engine.badge_progress();
    for category in BadgeCategory::ALL {
        let rows: Vec<_> = progress
            .iter()
            .filter_map(|(id, current, target)| {
                BADGES
                    .iter()
                    .find(|d| d.id == *id && d.category == category)
                    .map(|d| (d, current, target))
            })
            .collect();
        if rows.is_empty() {
            continue;
        }

        println!("\n{}:", category.label());
        for (def, current, target) in rows {
            println!("  {} {:<18} {}/{}  {}", def.icon, def.name, current, target, def.description);
        }
    }
    Ok(())
}
