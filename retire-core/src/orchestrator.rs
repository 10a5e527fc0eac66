//! Full (re)generation of a plan's stored projection.
//!
//! A run validates the parameters, clears the plan's previously generated
//! data, writes fresh snapshots and milestones and finally stamps the plan's
//! aggregate. Runs for the same plan id are serialized; runs for different
//! plans proceed concurrently.
//!
//! If anything fails after the clear, the run deletes what it wrote and
//! resets the aggregate so the plan never reports data it does not have.
//! The storage work runs on a spawned task and finishes even when the
//! caller's future is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};

use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::calculations::{
    AllocationPolicy, MilestoneDeriver, ProjectionCalculator, ProjectionSummary,
    ProportionalPolicy,
};
use crate::db::{PlanRepository, RepositoryError};
use crate::emitter::{SamplingPolicy, SnapshotEmitter};
use crate::models::{
    AnnualProjection, InvalidParameters, PersonalMilestone, PlanAggregate, PlanParameters,
    ProjectionAssumptions,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("invalid plan parameters: {0}")]
    InvalidParameters(#[from] InvalidParameters),

    #[error("generation failed for plan {plan_id}: {source}")]
    GenerationFailed {
        plan_id: i64,
        #[source]
        source: RepositoryError,
        /// Whether the compensating cleanup succeeded.
        rolled_back: bool,
    },
}

/// What a successful run wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub plan_id: i64,
    pub years_projected: usize,
    pub snapshots_written: usize,
    pub milestones_written: usize,
    pub total_lifetime_tax: Decimal,
    pub depleted_at_age: Option<i32>,
}

pub struct PlanOrchestrator {
    repo: Arc<dyn PlanRepository>,
    assumptions: ProjectionAssumptions,
    policy: Arc<dyn AllocationPolicy>,
    sampling: SamplingPolicy,
    locks: StdMutex<HashMap<i64, Weak<Mutex<()>>>>,
}

impl PlanOrchestrator {
    pub fn new(repo: Arc<dyn PlanRepository>) -> Self {
        Self {
            repo,
            assumptions: ProjectionAssumptions::default(),
            policy: Arc::new(ProportionalPolicy::default()),
            sampling: SamplingPolicy::EveryYear,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn with_assumptions(mut self, assumptions: ProjectionAssumptions) -> Self {
        self.assumptions = assumptions;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn AllocationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingPolicy) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn repository(&self) -> &Arc<dyn PlanRepository> {
        &self.repo
    }

    /// Runs the projection without touching storage.
    pub fn project(
        &self,
        params: &PlanParameters,
    ) -> Result<Vec<AnnualProjection>, InvalidParameters> {
        let calculator =
            ProjectionCalculator::new(params, &self.assumptions, self.policy.as_ref())?;
        Ok(calculator.run())
    }

    /// Replaces all generated data of `plan_id` with a fresh run.
    ///
    /// The storage work runs on its own task, so a caller that stops
    /// polling still gets either a complete run or a rolled-back one.
    ///
    /// # Errors
    ///
    /// * [`GenerationError::InvalidParameters`] before anything is written.
    /// * [`GenerationError::GenerationFailed`] if storage fails; the partial
    ///   run has been cleaned up when `rolled_back` is true.
    pub async fn generate(
        &self,
        plan_id: i64,
        params: &PlanParameters,
        personal: &[PersonalMilestone],
    ) -> Result<GenerationReport, GenerationError> {
        let projections = self.project(params)?;

        let run = GenerationRun {
            repo: self.repo.clone(),
            sampling: self.sampling,
            plan_id,
            params: params.clone(),
            personal: personal.to_vec(),
            projections,
        };
        let handle = tokio::spawn(run.execute(self.plan_lock(plan_id)));

        let joined = handle.await;
        self.prune_locks();
        match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(GenerationError::GenerationFailed {
                plan_id,
                source: RepositoryError::Connection(format!("generation task stopped: {}", e)),
                rolled_back: false,
            }),
        }
    }

    fn plan_lock(
        &self,
        plan_id: i64,
    ) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(&plan_id).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(plan_id, Arc::downgrade(&lock));
        lock
    }

    fn prune_locks(&self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| lock.strong_count() > 0);
    }
}

/// One regeneration, owned so it can outlive the caller that started it.
struct GenerationRun {
    repo: Arc<dyn PlanRepository>,
    sampling: SamplingPolicy,
    plan_id: i64,
    params: PlanParameters,
    personal: Vec<PersonalMilestone>,
    projections: Vec<AnnualProjection>,
}

impl GenerationRun {
    async fn execute(
        self,
        lock: Arc<Mutex<()>>,
    ) -> Result<GenerationReport, GenerationError> {
        let plan_id = self.plan_id;
        let _guard = lock.lock_owned().await;
        info!(plan_id, years = self.projections.len(), "regenerating plan");

        match self.write().await {
            Ok(report) => {
                info!(
                    plan_id,
                    snapshots = report.snapshots_written,
                    milestones = report.milestones_written,
                    "plan regenerated"
                );
                Ok(report)
            }
            Err(source) => {
                error!(plan_id, error = %source, "generation failed, rolling back");
                let rolled_back = self.rollback().await;
                Err(GenerationError::GenerationFailed {
                    plan_id,
                    source,
                    rolled_back,
                })
            }
        }
    }

    async fn write(&self) -> Result<GenerationReport, RepositoryError> {
        let plan_id = self.plan_id;
        let projections = self.projections.as_slice();
        let repo = self.repo.as_ref();
        repo.delete_generated_data(plan_id).await?;

        let records = SnapshotEmitter::new(repo, self.sampling)
            .emit(plan_id, projections)
            .await?;

        let milestones = MilestoneDeriver::new(&self.params).derive(Some(plan_id), &self.personal);
        for milestone in &milestones {
            repo.create_milestone(milestone).await?;
        }

        let summary = ProjectionSummary::from_projections(projections);
        let total_lifetime_tax = summary
            .as_ref()
            .map_or(Decimal::ZERO, |s| s.total_lifetime_tax);
        repo.update_plan_aggregate(
            plan_id,
            PlanAggregate {
                total_lifetime_tax: Some(total_lifetime_tax),
            },
        )
        .await?;

        Ok(GenerationReport {
            plan_id,
            years_projected: projections.len(),
            snapshots_written: records.snapshot_ids.len(),
            milestones_written: milestones.len(),
            total_lifetime_tax,
            depleted_at_age: summary.and_then(|s| s.depleted_at_age),
        })
    }

    async fn rollback(&self) -> bool {
        let plan_id = self.plan_id;
        let mut clean = true;
        if let Err(e) = self.repo.delete_generated_data(plan_id).await {
            warn!(plan_id, error = %e, "could not delete partial generation");
            clean = false;
        }
        if let Err(e) = self
            .repo
            .update_plan_aggregate(plan_id, PlanAggregate { total_lifetime_tax: None })
            .await
        {
            warn!(plan_id, error = %e, "could not clear plan aggregate");
            clean = false;
        }
        clean
    }
}
