//! Status command implementation

use anyhow::Result;

use lingo::config::Config;
use lingo::engine::LevelProgress;

/// Show streak, level and chest at a glance
pub async fn status_command(config: &Config) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let now = engine.now();
    let state = engine.snapshot();
    let level = LevelProgress::new(state.progress.xp);

    println!("Level {} - {}", level.level, level.title);
    match level.next_level_xp {
        Some(next) => println!(
            "  XP: {} ({:.0}% to {})",
            state.progress.xp,
            level.progress_to_next() * 100.0,
            next
        ),
        None => println!("  XP: {} (max level)", state.progress.xp),
    }

    let streak = &state.streak;
    println!(
        "\nStreak: {} day(s) (longest {})",
        engine.effective_streak(),
        streak.longest_streak
    );
    if streak.is_at_risk(now) && streak.is_active(now) {
        if let Some(hours) = streak.hours_until_break(now) {
            println!("  At risk: practice within {}h to keep it", hours);
        }
    }
    if streak.freeze_protects(now) {
        if let Some(expires) = streak.freeze_expires_at {
            println!("  Freeze armed until {}", expires.format("%Y-%m-%d %H:%M UTC"));
        }
    }

    println!(
        "\nLessons: {}/{} completed, {} perfect, {} exercises",
        state.progress.completed_lessons.len(),
        engine.ledger().catalog().len(),
        state.progress.perfect_lessons.len(),
        state.progress.total_exercises_completed
    );
    println!("Badges: {}/{}", state.badges.earned_count(), state.badges.iter().count());

    let chest = engine.chest_view();
    if chest.is_available {
        println!("\nDaily chest: ready ({})", chest.next_rarity.as_str());
    } else if let Some(at) = chest.next_available_at(now) {
        println!("\nDaily chest: opens at {}", at.format("%Y-%m-%d %H:%M UTC"));
    }

    Ok(())
}

/// List the catalog with lock state
pub async fn lessons_command(config: &Config) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let progress = &engine.snapshot().progress;

    let mut unit = 0;
    for lesson in engine.ledger().catalog().lessons() {
        if lesson.unit != unit {
            unit = lesson.unit;
            println!("\nUnit {}", unit);
        }

        let marker = if progress.perfect_lessons.contains(&lesson.id) {
            "*"
        } else if progress.completed_lessons.contains(&lesson.id) {
            "x"
        } else if progress.unlocked_lessons.contains(&lesson.id) {
            " "
        } else {
            "-"
        };
        print!("  [{}] {:<14} {}", marker, lesson.id, lesson.title);
        if let Some(p) = progress.lesson_progress.get(&lesson.id) {
            print!("  (best {}, {} attempt(s))", p.best_score, p.attempts);
        }
        println!();
    }
    println!("\n  [x] done  [*] perfect  [-] locked");

    Ok(())
}
