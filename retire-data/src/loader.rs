use std::io::Read;
use std::sync::Arc;

use retire_core::{
    GenerationError, GenerationReport, InvalidParameters, LiabilityParameters, NewPlan,
    PlanOrchestrator, PlanParameters, PlanParametersInput, PlanRepository, RepositoryError,
    SamplingPolicy,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

/// Snapshot cadence used for demo plans.
pub const DEFAULT_SAMPLE_EVERY: usize = 5;

/// Errors that can occur when seeding demo plans.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Invalid demo plan '{name}': {source}")]
    InvalidPlan {
        name: String,
        #[source]
        source: InvalidParameters,
    },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),
}

impl From<csv::Error> for SeedError {
    fn from(err: csv::Error) -> Self {
        SeedError::CsvParse(err.to_string())
    }
}

/// A single demo plan from the seed CSV.
///
/// Rates are fractions of 1 (`0.07` for 7%). The spouse, working expense
/// and liability columns may be left empty.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DemoPlanRecord {
    pub name: String,
    pub user_id: Option<i64>,
    pub start_year: i32,
    pub start_age: i32,
    pub retirement_age: i32,
    pub end_age: i32,
    pub portfolio_growth_rate: Decimal,
    pub bond_growth_rate: Decimal,
    pub inflation_rate: Decimal,
    pub social_security_start_age: i32,
    pub estimated_social_security_benefit: Decimal,
    pub spouse_social_security_start_age: Option<i32>,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub spouse_estimated_social_security_benefit: Option<Decimal>,
    pub current_annual_income: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub working_annual_expenses: Option<Decimal>,
    pub desired_annual_retirement_spending: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub pension_income: Option<Decimal>,
    pub initial_net_worth: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub liability_balance: Option<Decimal>,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub liability_interest_rate: Option<Decimal>,
    pub liability_payoff_age: Option<i32>,
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

impl DemoPlanRecord {
    /// Validated plan parameters for this row.
    pub fn parameters(&self) -> Result<PlanParameters, SeedError> {
        let liability = match (
            self.liability_balance,
            self.liability_interest_rate,
            self.liability_payoff_age,
        ) {
            (Some(balance), interest_rate, Some(payoff_age)) => Some(LiabilityParameters {
                balance,
                interest_rate: interest_rate.unwrap_or(Decimal::ZERO),
                payoff_age,
            }),
            (None, _, None) => None,
            _ => {
                return Err(SeedError::InvalidPlan {
                    name: self.name.clone(),
                    source: InvalidParameters::InvalidLiability(
                        "liability balance and payoff age must be given together".to_string(),
                    ),
                });
            }
        };

        PlanParametersInput {
            start_year: Some(self.start_year),
            start_age: Some(self.start_age),
            retirement_age: Some(self.retirement_age),
            end_age: Some(self.end_age),
            portfolio_growth_rate: Some(self.portfolio_growth_rate),
            bond_growth_rate: Some(self.bond_growth_rate),
            inflation_rate: Some(self.inflation_rate),
            social_security_start_age: Some(self.social_security_start_age),
            estimated_social_security_benefit: Some(self.estimated_social_security_benefit),
            spouse_social_security_start_age: self.spouse_social_security_start_age,
            spouse_estimated_social_security_benefit: self.spouse_estimated_social_security_benefit,
            current_annual_income: Some(self.current_annual_income),
            working_annual_expenses: self.working_annual_expenses,
            desired_annual_retirement_spending: Some(self.desired_annual_retirement_spending),
            pension_income: self.pension_income,
            initial_net_worth: Some(self.initial_net_worth),
            liability,
        }
        .validate()
        .map_err(|source| SeedError::InvalidPlan {
            name: self.name.clone(),
            source,
        })
    }
}

/// Seeds demo plans from CSV and generates their projections.
///
/// Demo plans are stored at a sparse cadence, every
/// [`DEFAULT_SAMPLE_EVERY`] years plus the final year, to keep seed
/// databases small.
pub struct DemoPlanLoader;

impl DemoPlanLoader {
    /// Parse demo plan records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<DemoPlanRecord>, SeedError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: DemoPlanRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Create (or reuse, matched by name) a plan per record and regenerate it.
    ///
    /// Every record is validated before anything is written, so a bad row
    /// leaves the database untouched. Re-running the same load produces the
    /// same plans and snapshots.
    pub async fn load(
        repo: Arc<dyn PlanRepository>,
        records: &[DemoPlanRecord],
        sample_every: usize,
    ) -> Result<Vec<GenerationReport>, SeedError> {
        let parameters = records
            .iter()
            .map(DemoPlanRecord::parameters)
            .collect::<Result<Vec<_>, _>>()?;

        let existing = repo.list_plans().await?;
        let orchestrator = PlanOrchestrator::new(repo.clone())
            .with_sampling(SamplingPolicy::EveryNthYear(sample_every));

        let mut reports = Vec::with_capacity(records.len());
        for (record, params) in records.iter().zip(&parameters) {
            let plan_id = match existing.iter().find(|p| p.name == record.name) {
                Some(plan) => plan.id,
                None => {
                    repo.create_plan(&NewPlan {
                        user_id: record.user_id,
                        name: record.name.clone(),
                    })
                    .await?
                    .id
                }
            };

            reports.push(orchestrator.generate(plan_id, params, &[]).await?);
        }

        Ok(reports)
    }
}
