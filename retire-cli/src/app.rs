use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use retire_core::{
    AllocationPolicy, AnnualProjection, InMemoryRepositoryFactory, InvalidParameters, Milestone,
    NewPlan, PersonalMilestone, Phase, Plan, PlanOrchestrator, PlanParameters,
    PlanParametersInput, PlanRepository, ProjectionAssumptions, ProjectionSummary,
    RepositoryError, RepositoryRegistry, Snapshot, policy_by_name,
};
use retire_db_sqlite::SqliteRepositoryFactory;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_POLICY: &str = "proportional";

/// Register every storage backend the binary can talk to.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry.register(Box::new(InMemoryRepositoryFactory));
    registry
}

#[derive(Debug, Error)]
pub enum PlanFileError {
    #[error("failed to read plan file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse plan file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown allocation policy '{0}'; expected 'proportional' or 'tax-sequenced'")]
    UnknownPolicy(String),

    #[error(transparent)]
    InvalidParameters(#[from] InvalidParameters),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanSection {
    pub name: String,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// A plan described in TOML.
///
/// ```toml
/// policy = "tax-sequenced"
///
/// [plan]
/// name = "Household"
///
/// [parameters]
/// start_age = 40
/// # ...
///
/// [parameters.liability]
/// balance = 250000
/// interest_rate = 0.05
/// payoff_age = 60
///
/// [[milestones]]
/// title = "Pay for college"
/// target_age = 55
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanFile {
    pub plan: PlanSection,
    pub parameters: PlanParametersInput,
    #[serde(default)]
    pub assumptions: ProjectionAssumptions,
    #[serde(default = "default_policy")]
    pub policy: String,
    #[serde(default)]
    pub milestones: Vec<PersonalMilestone>,
}

fn default_policy() -> String {
    DEFAULT_POLICY.to_string()
}

impl PlanFile {
    pub fn parse(contents: &str) -> Result<Self, PlanFileError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, PlanFileError> {
        let contents = std::fs::read_to_string(path).map_err(|source| PlanFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "read plan file");
        Self::parse(&contents)
    }

    /// Validated parameters. An omitted `start_year` means this year.
    pub fn parameters(&self) -> Result<PlanParameters, PlanFileError> {
        let mut input = self.parameters.clone();
        if input.start_year.is_none() {
            input.start_year = Some(Utc::now().year());
        }
        Ok(input.validate()?)
    }

    pub fn allocation_policy(&self) -> Result<Arc<dyn AllocationPolicy>, PlanFileError> {
        policy_by_name(&self.policy).ok_or_else(|| PlanFileError::UnknownPolicy(self.policy.clone()))
    }

    pub fn new_plan(&self) -> NewPlan {
        NewPlan {
            user_id: self.plan.user_id,
            name: self.plan.name.clone(),
        }
    }

    /// Orchestrator configured with this file's assumptions and policy.
    pub fn orchestrator(
        &self,
        repo: Arc<dyn PlanRepository>,
    ) -> Result<PlanOrchestrator, PlanFileError> {
        Ok(PlanOrchestrator::new(repo)
            .with_assumptions(self.assumptions.clone())
            .with_policy(self.allocation_policy()?))
    }
}

/// Return the plan with `id`, or the first plan named like `new_plan`,
/// creating one if neither exists.
pub async fn resolve_plan(
    repo: &dyn PlanRepository,
    id: Option<i64>,
    new_plan: &NewPlan,
) -> Result<Plan, RepositoryError> {
    if let Some(id) = id {
        return repo.get_plan(id).await;
    }

    let existing = repo
        .list_plans()
        .await?
        .into_iter()
        .find(|plan| plan.name == new_plan.name);

    match existing {
        Some(plan) => {
            debug!(plan_id = plan.id, "reusing plan '{}'", plan.name);
            Ok(plan)
        }
        None => {
            let plan = repo.create_plan(new_plan).await?;
            info!(plan_id = plan.id, "created plan '{}'", plan.name);
            Ok(plan)
        }
    }
}

// ─── formatting ──────────────────────────────────────────────────────────────

pub fn format_summary(summary: &ProjectionSummary) -> String {
    let depletion = summary
        .depleted_at_age
        .map_or_else(|| "never".to_string(), |age| format!("age {}", age));
    format!(
        "{} years projected\n\
         lifetime tax:    {:>14}\n\
         peak assets:     {:>14}\n\
         final net worth: {:>14}\n\
         assets depleted: {}",
        summary.years,
        summary.total_lifetime_tax,
        summary.peak_assets,
        summary.final_net_worth,
        depletion
    )
}

pub fn format_projection_table(projections: &[AnnualProjection]) -> String {
    let mut out = format!(
        "{:>4} {:>3} {:<8} {:>12} {:>12} {:>12} {:>14} {:>12}\n",
        "year", "age", "phase", "gross", "expenses", "taxes", "assets", "net worth"
    );
    for p in projections {
        let phase = match p.phase {
            Phase::Working => "working",
            Phase::Retired => "retired",
        };
        let _ = writeln!(
            out,
            "{:>4} {:>3} {:<8} {:>12} {:>12} {:>12} {:>14} {:>12}",
            p.year,
            p.age,
            phase,
            p.gross_income,
            p.total_expenses,
            p.taxes_paid,
            p.total_assets,
            p.net_worth
        );
    }
    out
}

pub fn format_snapshots(snapshots: &[Snapshot]) -> String {
    let mut out = format!(
        "{:>4} {:>3} {:>12} {:>12} {:>14} {:>12} {:>14}\n",
        "year", "age", "gross", "taxes", "assets", "liabilities", "net worth"
    );
    for s in snapshots {
        let _ = writeln!(
            out,
            "{:>4} {:>3} {:>12} {:>12} {:>14} {:>12} {:>14}",
            s.year, s.age, s.gross_income, s.taxes_paid, s.total_assets, s.total_liabilities, s.net_worth
        );
    }
    out
}

pub fn format_milestones(milestones: &[Milestone]) -> String {
    let mut out = String::new();
    for m in milestones {
        let when = match (m.target_age, m.target_year) {
            (Some(age), Some(year)) => format!("age {} ({})", age, year),
            (Some(age), None) => format!("age {}", age),
            (None, Some(year)) => year.to_string(),
            (None, None) => "unscheduled".to_string(),
        };
        let _ = writeln!(
            out,
            "{:<10} {:<18} {}",
            m.milestone_type.as_str(),
            when,
            m.title
        );
    }
    out
}
