use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use retire_core::PlanRepository;
use retire_data::{DEFAULT_SAMPLE_EVERY, DemoPlanLoader};
use retire_db_sqlite::SqliteRepository;

/// Seed demo retirement plans from a CSV file.
///
/// Each row describes one plan: ages, rates, income, spending, savings and
/// an optional liability. Plans are matched by name, so re-running the
/// seeder regenerates existing demo plans instead of duplicating them.
#[derive(Parser, Debug)]
#[command(name = "retire-seed")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CSV file containing demo plans
    #[arg(short, long)]
    file: PathBuf,

    /// SQLite database URL (e.g., sqlite:retire.db?mode=rwc to create if missing)
    #[arg(short, long, default_value = "sqlite:retire.db?mode=rwc")]
    database: String,

    /// Run database migrations before loading data
    #[arg(short, long, default_value_t = false)]
    migrate: bool,

    /// Run seed files from the specified directory after migrations
    #[arg(short, long)]
    seeds: Option<PathBuf>,

    /// Store a snapshot every N projected years (the final year is always kept)
    #[arg(short, long, default_value_t = DEFAULT_SAMPLE_EVERY)]
    every: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let repo = SqliteRepository::new(&args.database)
        .await
        .with_context(|| format!("Failed to connect to database: {}", args.database))?;

    if args.migrate {
        println!("Running migrations...");
        repo.run_migrations()
            .await
            .context("Failed to run migrations")?;
        println!("Migrations complete.");
    }

    if let Some(seeds_dir) = &args.seeds {
        println!("Running seeds from: {}", seeds_dir.display());
        repo.run_seeds(seeds_dir)
            .await
            .with_context(|| format!("Failed to run seeds from: {}", seeds_dir.display()))?;
        println!("Seeds complete.");
    }

    println!("Loading demo plans from: {}", args.file.display());

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open: {}", args.file.display()))?;

    let records = DemoPlanLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", args.file.display()))?;

    println!("Parsed {} demo plans from CSV", records.len());

    let repo: Arc<dyn PlanRepository> = Arc::new(repo);
    let reports = DemoPlanLoader::load(repo, &records, args.every)
        .await
        .context("Failed to generate demo plans")?;

    for report in &reports {
        let depletion = report
            .depleted_at_age
            .map_or_else(|| "never".to_string(), |age| age.to_string());
        println!(
            "  plan {}: {} years, {} snapshots, lifetime tax {}, depleted at {}",
            report.plan_id,
            report.years_projected,
            report.snapshots_written,
            report.total_lifetime_tax,
            depletion
        );
    }
    println!("Successfully seeded {} demo plans.", reports.len());

    Ok(())
}
