//! Persists projected years as snapshots with their account states.

use tracing::debug;

use crate::db::{PlanRepository, RepositoryError};
use crate::models::{AnnualProjection, NewAccountState, NewSnapshot};

/// Which projected years become stored snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SamplingPolicy {
    /// Every simulated year. Used for user plans.
    #[default]
    EveryYear,
    /// Every nth year counted from the first one, plus the final year.
    /// Used when seeding demo plans.
    EveryNthYear(usize),
}

impl SamplingPolicy {
    /// The projections this policy keeps, in age order.
    pub fn select<'p>(
        &self,
        projections: &'p [AnnualProjection],
    ) -> Vec<&'p AnnualProjection> {
        match *self {
            Self::EveryYear => projections.iter().collect(),
            Self::EveryNthYear(n) => {
                let step = n.max(1);
                let last = projections.len().saturating_sub(1);
                projections
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| i % step == 0 || *i == last)
                    .map(|(_, p)| p)
                    .collect()
            }
        }
    }
}

/// Ids written by one emission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmittedRecords {
    pub snapshot_ids: Vec<i64>,
    pub account_state_ids: Vec<i64>,
}

pub struct SnapshotEmitter<'a> {
    repo: &'a dyn PlanRepository,
    sampling: SamplingPolicy,
}

impl<'a> SnapshotEmitter<'a> {
    pub fn new(
        repo: &'a dyn PlanRepository,
        sampling: SamplingPolicy,
    ) -> Self {
        Self { repo, sampling }
    }

    /// Writes one snapshot per selected year followed by one account state
    /// per bucket.
    ///
    /// # Errors
    ///
    /// Stops at the first repository error. Records already written stay in
    /// place; callers clear them with `delete_generated_data`.
    pub async fn emit(
        &self,
        plan_id: i64,
        projections: &[AnnualProjection],
    ) -> Result<EmittedRecords, RepositoryError> {
        let selected = self.sampling.select(projections);
        let mut records = EmittedRecords::default();

        for projection in selected {
            let snapshot_id = self
                .repo
                .create_snapshot(plan_id, &NewSnapshot::from(projection))
                .await?;
            records.snapshot_ids.push(snapshot_id);

            for account in &projection.accounts {
                let id = self
                    .repo
                    .create_account_state(snapshot_id, &NewAccountState::from(account))
                    .await?;
                records.account_state_ids.push(id);
            }
        }

        debug!(
            plan_id,
            snapshots = records.snapshot_ids.len(),
            account_states = records.account_state_ids.len(),
            "emitted snapshots"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::InMemoryRepository;
    use crate::models::{AccountState, AccountType, NewPlan, Phase};

    fn projections(
        start_age: i32,
        count: i32,
    ) -> Vec<AnnualProjection> {
        (start_age..start_age + count)
            .map(|age| AnnualProjection {
                year: 1995 + age,
                age,
                phase: Phase::Working,
                gross_income: Decimal::from(age),
                net_income: Decimal::from(age),
                total_expenses: Decimal::ZERO,
                taxes_paid: Decimal::ZERO,
                cumulative_tax: Decimal::ZERO,
                total_assets: Decimal::from(age * 100),
                total_liabilities: Decimal::ZERO,
                net_worth: Decimal::from(age * 100),
                accounts: AccountType::ALL
                    .iter()
                    .map(|&account_type| AccountState {
                        account_type,
                        balance: Decimal::from(age * 25),
                        contribution: Decimal::ZERO,
                        withdrawal: Decimal::ZERO,
                        growth: Decimal::ZERO,
                    })
                    .collect(),
            })
            .collect()
    }

    fn ages(selected: &[&AnnualProjection]) -> Vec<i32> {
        selected.iter().map(|p| p.age).collect()
    }

    #[test]
    fn every_year_keeps_everything() {
        let years = projections(30, 5);

        assert_eq!(ages(&SamplingPolicy::EveryYear.select(&years)), vec![30, 31, 32, 33, 34]);
    }

    #[test]
    fn every_nth_year_counts_from_start_and_keeps_final_year() {
        let years = projections(30, 12);

        assert_eq!(
            ages(&SamplingPolicy::EveryNthYear(5).select(&years)),
            vec![30, 35, 40, 41]
        );
    }

    #[test]
    fn every_nth_year_does_not_duplicate_aligned_final_year() {
        let years = projections(30, 11);

        assert_eq!(
            ages(&SamplingPolicy::EveryNthYear(5).select(&years)),
            vec![30, 35, 40]
        );
    }

    #[test]
    fn zero_step_behaves_like_every_year() {
        let years = projections(30, 3);

        assert_eq!(ages(&SamplingPolicy::EveryNthYear(0).select(&years)), vec![30, 31, 32]);
    }

    #[test]
    fn empty_projection_selects_nothing() {
        assert!(SamplingPolicy::EveryNthYear(5).select(&[]).is_empty());
    }

    #[tokio::test]
    async fn emit_writes_snapshot_and_bucket_per_year() {
        let repo = InMemoryRepository::new();
        let plan = repo
            .create_plan(&NewPlan {
                user_id: None,
                name: "p".to_string(),
            })
            .await
            .unwrap();
        let years = projections(30, 3);

        let records = SnapshotEmitter::new(&repo, SamplingPolicy::EveryYear)
            .emit(plan.id, &years)
            .await
            .unwrap();

        assert_eq!(records.snapshot_ids.len(), 3);
        assert_eq!(records.account_state_ids.len(), 12);
        let stored = repo.list_snapshots(plan.id).await.unwrap();
        assert_eq!(stored[1].values(), NewSnapshot::from(&years[1]));
        let buckets = repo.list_account_states(stored[0].id).await.unwrap();
        let names: Vec<&str> = buckets.iter().map(|b| b.account_name.as_str()).collect();
        assert_eq!(
            names,
            AccountType::ALL.iter().map(|a| a.display_name()).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn emit_stops_at_first_error() {
        let repo = InMemoryRepository::new();

        let result = SnapshotEmitter::new(&repo, SamplingPolicy::EveryYear)
            .emit(99, &projections(30, 3))
            .await;

        assert_eq!(result, Err(RepositoryError::NotFound));
    }
}
