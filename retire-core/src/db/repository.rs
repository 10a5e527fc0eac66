use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    AccountStateRecord, Milestone, NewAccountState, NewMilestone, NewPlan, NewSnapshot, Plan,
    PlanAggregate, Snapshot,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Persistence collaborator for plans and everything generated from them.
///
/// "Generated data" is the snapshots, their account states and the
/// plan-scoped milestones written by a generation run. Implementations must
/// make [`delete_generated_data`](Self::delete_generated_data) remove all of
/// it so a regeneration never leaves duplicates or orphans behind.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    // Plans
    async fn create_plan(&self, plan: &NewPlan) -> Result<Plan, RepositoryError>;
    async fn get_plan(&self, id: i64) -> Result<Plan, RepositoryError>;
    async fn list_plans(&self) -> Result<Vec<Plan>, RepositoryError>;
    async fn delete_plan(&self, id: i64) -> Result<(), RepositoryError>;

    async fn update_plan_aggregate(
        &self,
        plan_id: i64,
        aggregate: PlanAggregate,
    ) -> Result<(), RepositoryError>;

    // Generated data
    async fn delete_generated_data(&self, plan_id: i64) -> Result<(), RepositoryError>;

    async fn create_snapshot(
        &self,
        plan_id: i64,
        snapshot: &NewSnapshot,
    ) -> Result<i64, RepositoryError>;

    async fn create_account_state(
        &self,
        snapshot_id: i64,
        state: &NewAccountState,
    ) -> Result<i64, RepositoryError>;

    async fn create_milestone(&self, milestone: &NewMilestone) -> Result<i64, RepositoryError>;

    /// Snapshots of a plan ordered by age.
    async fn list_snapshots(&self, plan_id: i64) -> Result<Vec<Snapshot>, RepositoryError>;

    async fn list_account_states(
        &self,
        snapshot_id: i64,
    ) -> Result<Vec<AccountStateRecord>, RepositoryError>;

    /// Milestones of a plan ordered by target age, personal ones without an
    /// age last.
    async fn list_milestones(&self, plan_id: i64) -> Result<Vec<Milestone>, RepositoryError>;
}
