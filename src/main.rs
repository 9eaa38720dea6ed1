use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use lingo::config::Config;

mod cli;

#[derive(Parser)]
#[command(name = "lingo")]
#[command(about = "Streaks, daily chests, XP and badges for your language practice")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.lingo/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config with a fresh user id
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show level, streak, lessons and chest
    Status,

    /// List lessons with their lock state
    Lessons,

    /// Record a finished lesson
    Complete {
        /// Lesson id (see `lingo lessons`)
        lesson: String,

        /// Base score before the streak multiplier
        #[arg(long)]
        score: u64,

        /// Number of exercises in the session
        #[arg(long, default_value_t = 0)]
        exercises: u64,

        /// The lesson was finished without mistakes
        #[arg(long)]
        perfect: bool,
    },

    /// Show the daily chest, or open it
    Chest {
        #[arg(long)]
        open: bool,

        /// Draw from the premium table regardless of config
        #[arg(long)]
        premium: bool,

        /// Seed the reward draw (reproducible output)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Arm a streak freeze for the next 24 hours
    Freeze,

    /// Show earned badges and progress on the rest
    Badges,

    /// Merge local progress with the remote store
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config_path = cli.config.as_deref();
    let load = || Config::load(config_path);

    // Default: show status
    match cli.command.unwrap_or(Commands::Status) {
        Commands::Init { force } => cli::init::init_command(config_path, force).await?,
        Commands::Status => cli::status::status_command(&load()?).await?,
        Commands::Lessons => cli::status::lessons_command(&load()?).await?,
        Commands::Complete {
            lesson,
            score,
            exercises,
            perfect,
        } => cli::lesson::complete_command(&load()?, &lesson, score, exercises, perfect).await?,
        Commands::Chest {
            open,
            premium,
            seed,
        } => cli::chest::chest_command(&load()?, open, premium, seed).await?,
        Commands::Freeze => cli::chest::freeze_command(&load()?).await?,
        Commands::Badges => cli::badges::badges_command(&load()?).await?,
        Commands::Sync => cli::sync::sync_command(&load()?).await?,
    }

    Ok(())
}
