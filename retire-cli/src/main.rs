use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use retire_core::{PlanRepository, ProjectionSummary};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use retire_cli::app::{self, PlanFile};
use retire_core::db::DbConfig;

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Retirement projection engine.
///
/// Projects a plan year by year from a TOML plan file, stores the
/// resulting snapshots and milestones, and prints stored plans.
#[derive(Debug, Parser)]
#[command(name = "retire", version)]
struct Cli {
    /// Database backend to use (`sqlite` or `memory`).
    #[arg(long, default_value = "sqlite")]
    backend: String,

    /// Database connection string.
    /// For SQLite this is a file path (e.g. `retire.db`) or `:memory:`.
    #[arg(long, default_value = "retire.db")]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the year-by-year projection without storing anything.
    Project {
        /// TOML plan file.
        file: PathBuf,
    },

    /// Regenerate a stored plan's snapshots and milestones.
    Generate {
        /// TOML plan file.
        file: PathBuf,

        /// Existing plan to regenerate; otherwise the plan is matched by name.
        #[arg(long)]
        plan_id: Option<i64>,
    },

    /// List a stored plan's milestones.
    Milestones {
        plan_id: i64,
    },

    /// Show a stored plan and its snapshots.
    Show {
        plan_id: i64,
    },
}

// ─── tracing ─────────────────────────────────────────────────────────────────

/// Initialise the tracing subscriber.
///
/// * Honours `RUST_LOG` when set.
/// * Falls back to `info` so normal runs are quiet.
/// * Strips timestamps and target names to keep CLI output clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

// ─── commands ────────────────────────────────────────────────────────────────

fn project(file: &Path) -> anyhow::Result<()> {
    let plan_file = PlanFile::load(file)?;
    let params = plan_file.parameters()?;
    let policy = plan_file.allocation_policy()?;

    let calculator =
        retire_core::ProjectionCalculator::new(&params, &plan_file.assumptions, policy.as_ref())?;
    let projections = calculator.run();

    println!("{}", app::format_projection_table(&projections));
    if let Some(summary) = ProjectionSummary::from_projections(&projections) {
        println!("{}", app::format_summary(&summary));
    }
    Ok(())
}

async fn generate(
    repo: Arc<dyn PlanRepository>,
    file: &Path,
    plan_id: Option<i64>,
) -> anyhow::Result<()> {
    let plan_file = PlanFile::load(file)?;
    let params = plan_file.parameters()?;
    let orchestrator = plan_file.orchestrator(repo.clone())?;

    let plan = app::resolve_plan(repo.as_ref(), plan_id, &plan_file.new_plan())
        .await
        .context("failed to resolve plan")?;

    let report = orchestrator
        .generate(plan.id, &params, &plan_file.milestones)
        .await
        .with_context(|| format!("failed to generate plan {}", plan.id))?;

    let depletion = report
        .depleted_at_age
        .map_or_else(|| "never".to_string(), |age| age.to_string());
    info!(
        plan_id = report.plan_id,
        snapshots = report.snapshots_written,
        milestones = report.milestones_written,
        "generated '{}'",
        plan.name
    );
    println!(
        "plan {}: {} years, {} snapshots, {} milestones, lifetime tax {}, depleted at {}",
        report.plan_id,
        report.years_projected,
        report.snapshots_written,
        report.milestones_written,
        report.total_lifetime_tax,
        depletion
    );
    Ok(())
}

async fn milestones(
    repo: &dyn PlanRepository,
    plan_id: i64,
) -> anyhow::Result<()> {
    repo.get_plan(plan_id).await?;
    let milestones = repo.list_milestones(plan_id).await?;
    print!("{}", app::format_milestones(&milestones));
    Ok(())
}

async fn show(
    repo: &dyn PlanRepository,
    plan_id: i64,
) -> anyhow::Result<()> {
    let plan = repo.get_plan(plan_id).await?;
    let snapshots = repo.list_snapshots(plan_id).await?;

    let lifetime_tax = plan
        .total_lifetime_tax
        .map_or_else(|| "not generated".to_string(), |tax| tax.to_string());
    println!("plan {}: {}", plan.id, plan.name);
    println!("updated:      {}", plan.updated_at.format("%Y-%m-%d %H:%M:%S"));
    println!("lifetime tax: {}", lifetime_tax);
    println!();
    print!("{}", app::format_snapshots(&snapshots));
    Ok(())
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if let Command::Project { file } = &cli.command {
        return project(file);
    }

    let db_config = DbConfig::new(cli.backend, cli.db);

    debug!("connecting to {} backend", db_config.backend);
    let registry = app::build_registry();
    let repo: Arc<dyn PlanRepository> = registry.create(&db_config).await?.into();

    match cli.command {
        Command::Project { .. } => Ok(()),
        Command::Generate { file, plan_id } => generate(repo, &file, plan_id).await,
        Command::Milestones { plan_id } => milestones(repo.as_ref(), plan_id).await,
        Command::Show { plan_id } => show(repo.as_ref(), plan_id).await,
    }
}
