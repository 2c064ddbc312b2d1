use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod db;
mod fetch;
mod mappings;
mod matches;
mod schema;
mod stats;
mod tables;

#[derive(Parser)]
#[command(name = "statlines")]
#[command(about = "FBref football statistics scraper with SQLite storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape team season statistics for a competition
    Stats {
        /// FBref competition id (9 = Premier League, 12 = La Liga, ...)
        #[arg(short, long)]
        competition: i64,
        /// Season label, e.g. "2024-2025"
        #[arg(short, long)]
        season: String,
        /// SQLite database file
        #[arg(long, default_value = "statlines.db")]
        db: PathBuf,
        /// JSON file with extra team-name aliases
        #[arg(long)]
        aliases: Option<PathBuf>,
    },
    /// Scrape the match schedule and results for a competition
    Matches {
        /// FBref competition id (9 = Premier League, 12 = La Liga, ...)
        #[arg(short, long)]
        competition: i64,
        /// SQLite database file
        #[arg(long, default_value = "statlines.db")]
        db: PathBuf,
        /// JSON file with extra team-name aliases
        #[arg(long)]
        aliases: Option<PathBuf>,
    },
    /// Remove the scraped database
    Clean {
        /// SQLite database file
        #[arg(long, default_value = "statlines.db")]
        db: PathBuf,
    },
}

fn run_clean(db: &PathBuf) -> Result<()> {
    if db.exists() {
        fs::remove_file(db)?;
        println!("Removed {}", db.display());
    } else {
        println!("Nothing to clean");
    }
    Ok(())
}

fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("statlines=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Stats {
            competition,
            season,
            db,
            aliases,
        } => stats::run_stats(competition, &season, &db, aliases.as_deref()),
        Commands::Matches {
            competition,
            db,
            aliases,
        } => matches::run_matches(competition, &db, aliases.as_deref()),
        Commands::Clean { db } => run_clean(&db),
    }
}
