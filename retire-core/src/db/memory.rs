//! Process-local [`PlanRepository`] backend.
//!
//! Mirrors the relational backends closely enough to stand in for them:
//! ids are assigned per table starting at 1, child rows require their parent
//! and deleting a plan cascades to everything generated for it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::factory::{DbConfig, RepositoryFactory};
use super::repository::{PlanRepository, RepositoryError};
use crate::models::{
    AccountStateRecord, Milestone, NewAccountState, NewMilestone, NewPlan, NewSnapshot, Plan,
    PlanAggregate, Snapshot,
};

#[derive(Debug)]
struct Table<T> {
    last_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            last_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn insert_with(
        &mut self,
        build: impl FnOnce(i64) -> T,
    ) -> i64 {
        self.last_id += 1;
        let id = self.last_id;
        self.rows.insert(id, build(id));
        id
    }
}

#[derive(Debug, Default)]
struct Store {
    plans: Table<Plan>,
    snapshots: Table<Snapshot>,
    account_states: Table<AccountStateRecord>,
    milestones: Table<Milestone>,
}

impl Store {
    fn require_plan(
        &self,
        plan_id: i64,
    ) -> Result<(), RepositoryError> {
        if self.plans.rows.contains_key(&plan_id) {
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn remove_generated(
        &mut self,
        plan_id: i64,
    ) {
        let snapshot_ids: Vec<i64> = self
            .snapshots
            .rows
            .values()
            .filter(|s| s.plan_id == plan_id)
            .map(|s| s.id)
            .collect();

        self.account_states
            .rows
            .retain(|_, a| !snapshot_ids.contains(&a.snapshot_id));
        self.snapshots.rows.retain(|_, s| s.plan_id != plan_id);
        self.milestones
            .rows
            .retain(|_, m| m.plan_id != Some(plan_id));
    }
}

/// [`PlanRepository`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanRepository for InMemoryRepository {
    async fn create_plan(&self, plan: &NewPlan) -> Result<Plan, RepositoryError> {
        let mut store = self.store.lock().await;
        let now = Utc::now();
        let id = store.plans.insert_with(|id| Plan {
            id,
            user_id: plan.user_id,
            name: plan.name.clone(),
            total_lifetime_tax: None,
            created_at: now,
            updated_at: now,
        });
        store
            .plans
            .rows
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_plan(&self, id: i64) -> Result<Plan, RepositoryError> {
        let store = self.store.lock().await;
        store
            .plans
            .rows
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_plans(&self) -> Result<Vec<Plan>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store.plans.rows.values().cloned().collect())
    }

    async fn delete_plan(&self, id: i64) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().await;
        store.require_plan(id)?;
        store.remove_generated(id);
        store.plans.rows.remove(&id);
        Ok(())
    }

    async fn update_plan_aggregate(
        &self,
        plan_id: i64,
        aggregate: PlanAggregate,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().await;
        let plan = store
            .plans
            .rows
            .get_mut(&plan_id)
            .ok_or(RepositoryError::NotFound)?;
        plan.total_lifetime_tax = aggregate.total_lifetime_tax;
        plan.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_generated_data(&self, plan_id: i64) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().await;
        store.require_plan(plan_id)?;
        store.remove_generated(plan_id);
        Ok(())
    }

    async fn create_snapshot(
        &self,
        plan_id: i64,
        snapshot: &NewSnapshot,
    ) -> Result<i64, RepositoryError> {
        let mut store = self.store.lock().await;
        store.require_plan(plan_id)?;
        Ok(store.snapshots.insert_with(|id| Snapshot {
            id,
            plan_id,
            year: snapshot.year,
            age: snapshot.age,
            gross_income: snapshot.gross_income,
            net_income: snapshot.net_income,
            total_expenses: snapshot.total_expenses,
            total_assets: snapshot.total_assets,
            total_liabilities: snapshot.total_liabilities,
            net_worth: snapshot.net_worth,
            taxes_paid: snapshot.taxes_paid,
            cumulative_tax: snapshot.cumulative_tax,
        }))
    }

    async fn create_account_state(
        &self,
        snapshot_id: i64,
        state: &NewAccountState,
    ) -> Result<i64, RepositoryError> {
        let mut store = self.store.lock().await;
        if !store.snapshots.rows.contains_key(&snapshot_id) {
            return Err(RepositoryError::NotFound);
        }
        Ok(store.account_states.insert_with(|id| AccountStateRecord {
            id,
            snapshot_id,
            account_type: state.account_type,
            account_name: state.account_name.clone(),
            balance: state.balance,
            contribution: state.contribution,
            withdrawal: state.withdrawal,
            growth: state.growth,
        }))
    }

    async fn create_milestone(&self, milestone: &NewMilestone) -> Result<i64, RepositoryError> {
        let mut store = self.store.lock().await;
        if let Some(plan_id) = milestone.plan_id {
            store.require_plan(plan_id)?;
        }
        Ok(store.milestones.insert_with(|id| Milestone {
            id,
            plan_id: milestone.plan_id,
            user_id: milestone.user_id,
            milestone_type: milestone.milestone_type,
            title: milestone.title.clone(),
            description: milestone.description.clone(),
            target_year: milestone.target_year,
            target_age: milestone.target_age,
            category: milestone.category.clone(),
            color: milestone.color.clone(),
            icon: milestone.icon.clone(),
        }))
    }

    async fn list_snapshots(&self, plan_id: i64) -> Result<Vec<Snapshot>, RepositoryError> {
        let store = self.store.lock().await;
        let mut snapshots: Vec<Snapshot> = store
            .snapshots
            .rows
            .values()
            .filter(|s| s.plan_id == plan_id)
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| (s.age, s.id));
        Ok(snapshots)
    }

    async fn list_account_states(
        &self,
        snapshot_id: i64,
    ) -> Result<Vec<AccountStateRecord>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store
            .account_states
            .rows
            .values()
            .filter(|a| a.snapshot_id == snapshot_id)
            .cloned()
            .collect())
    }

    async fn list_milestones(&self, plan_id: i64) -> Result<Vec<Milestone>, RepositoryError> {
        let store = self.store.lock().await;
        let mut milestones: Vec<Milestone> = store
            .milestones
            .rows
            .values()
            .filter(|m| m.plan_id == Some(plan_id))
            .cloned()
            .collect();
        milestones.sort_by_key(|m| (m.target_age.is_none(), m.target_age, m.id));
        Ok(milestones)
    }
}

/// Registers the in-memory backend under `"memory"`.
pub struct InMemoryRepositoryFactory;

#[async_trait]
impl RepositoryFactory for InMemoryRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create(
        &self,
        _config: &DbConfig,
    ) -> Result<Box<dyn PlanRepository>, RepositoryError> {
        Ok(Box::new(InMemoryRepository::new()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{AccountType, MilestoneType};

    fn new_plan(name: &str) -> NewPlan {
        NewPlan {
            user_id: Some(1),
            name: name.to_string(),
        }
    }

    fn snapshot_at(age: i32) -> NewSnapshot {
        NewSnapshot {
            year: 2025 + age - 30,
            age,
            gross_income: dec!(90000),
            net_income: dec!(67500),
            total_expenses: dec!(40000),
            total_assets: dec!(100000),
            total_liabilities: Decimal::ZERO,
            net_worth: dec!(100000),
            taxes_paid: dec!(22500),
            cumulative_tax: dec!(22500),
        }
    }

    fn account_state() -> NewAccountState {
        NewAccountState {
            account_type: AccountType::Roth,
            account_name: "Roth".to_string(),
            balance: dec!(20000),
            contribution: dec!(1000),
            withdrawal: Decimal::ZERO,
            growth: dec!(1400),
        }
    }

    fn milestone(
        plan_id: Option<i64>,
        target_age: Option<i32>,
    ) -> NewMilestone {
        NewMilestone {
            plan_id,
            user_id: None,
            milestone_type: MilestoneType::Standard,
            title: "Medicare eligibility".to_string(),
            description: String::new(),
            target_year: None,
            target_age,
            category: "healthcare".to_string(),
            color: "#3b82f6".to_string(),
            icon: "heart-pulse".to_string(),
        }
    }

    // ── plans ────────────────────────────────────────────────────────────
    #[tokio::test]
    async fn create_and_get_plan() {
        let repo = InMemoryRepository::new();

        let created = repo.create_plan(&new_plan("Early retirement")).await.unwrap();
        let fetched = repo.get_plan(created.id).await.unwrap();

        assert_eq!(created.id, 1);
        assert_eq!(fetched, created);
        assert_eq!(fetched.total_lifetime_tax, None);
    }

    #[tokio::test]
    async fn missing_plan_is_not_found() {
        let repo = InMemoryRepository::new();

        assert_eq!(repo.get_plan(42).await, Err(RepositoryError::NotFound));
        assert_eq!(
            repo.delete_generated_data(42).await,
            Err(RepositoryError::NotFound)
        );
    }

    #[tokio::test]
    async fn aggregate_is_updated_and_cleared() {
        let repo = InMemoryRepository::new();
        let plan = repo.create_plan(&new_plan("p")).await.unwrap();

        repo.update_plan_aggregate(
            plan.id,
            PlanAggregate {
                total_lifetime_tax: Some(dec!(1234.56)),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            repo.get_plan(plan.id).await.unwrap().total_lifetime_tax,
            Some(dec!(1234.56))
        );

        repo.update_plan_aggregate(plan.id, PlanAggregate { total_lifetime_tax: None })
            .await
            .unwrap();
        assert_eq!(repo.get_plan(plan.id).await.unwrap().total_lifetime_tax, None);
    }

    // ── generated data ───────────────────────────────────────────────────
    #[tokio::test]
    async fn snapshot_requires_existing_plan() {
        let repo = InMemoryRepository::new();

        assert_eq!(
            repo.create_snapshot(9, &snapshot_at(30)).await,
            Err(RepositoryError::NotFound)
        );
        assert_eq!(
            repo.create_account_state(9, &account_state()).await,
            Err(RepositoryError::NotFound)
        );
    }

    #[tokio::test]
    async fn snapshots_are_listed_by_age() {
        let repo = InMemoryRepository::new();
        let plan = repo.create_plan(&new_plan("p")).await.unwrap();

        repo.create_snapshot(plan.id, &snapshot_at(32)).await.unwrap();
        repo.create_snapshot(plan.id, &snapshot_at(30)).await.unwrap();
        repo.create_snapshot(plan.id, &snapshot_at(31)).await.unwrap();

        let ages: Vec<i32> = repo
            .list_snapshots(plan.id)
            .await
            .unwrap()
            .iter()
            .map(|s| s.age)
            .collect();
        assert_eq!(ages, vec![30, 31, 32]);
    }

    #[tokio::test]
    async fn delete_generated_data_only_touches_one_plan() {
        let repo = InMemoryRepository::new();
        let kept = repo.create_plan(&new_plan("kept")).await.unwrap();
        let cleared = repo.create_plan(&new_plan("cleared")).await.unwrap();
        for plan_id in [kept.id, cleared.id] {
            let snapshot_id = repo.create_snapshot(plan_id, &snapshot_at(30)).await.unwrap();
            repo.create_account_state(snapshot_id, &account_state())
                .await
                .unwrap();
            repo.create_milestone(&milestone(Some(plan_id), Some(65)))
                .await
                .unwrap();
        }

        repo.delete_generated_data(cleared.id).await.unwrap();

        assert!(repo.list_snapshots(cleared.id).await.unwrap().is_empty());
        assert!(repo.list_milestones(cleared.id).await.unwrap().is_empty());
        let kept_snapshots = repo.list_snapshots(kept.id).await.unwrap();
        assert_eq!(kept_snapshots.len(), 1);
        assert_eq!(
            repo.list_account_states(kept_snapshots[0].id)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(repo.list_milestones(kept.id).await.unwrap().len(), 1);
        assert_eq!(repo.store.lock().await.account_states.rows.len(), 1);
    }

    #[tokio::test]
    async fn delete_plan_cascades() {
        let repo = InMemoryRepository::new();
        let plan = repo.create_plan(&new_plan("p")).await.unwrap();
        let snapshot_id = repo.create_snapshot(plan.id, &snapshot_at(30)).await.unwrap();
        repo.create_account_state(snapshot_id, &account_state())
            .await
            .unwrap();

        repo.delete_plan(plan.id).await.unwrap();

        assert_eq!(repo.get_plan(plan.id).await, Err(RepositoryError::NotFound));
        assert!(repo.list_account_states(snapshot_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn milestones_without_age_sort_last() {
        let repo = InMemoryRepository::new();
        let plan = repo.create_plan(&new_plan("p")).await.unwrap();
        repo.create_milestone(&milestone(Some(plan.id), None))
            .await
            .unwrap();
        repo.create_milestone(&milestone(Some(plan.id), Some(73)))
            .await
            .unwrap();
        repo.create_milestone(&milestone(Some(plan.id), Some(50)))
            .await
            .unwrap();

        let ages: Vec<Option<i32>> = repo
            .list_milestones(plan.id)
            .await
            .unwrap()
            .iter()
            .map(|m| m.target_age)
            .collect();
        assert_eq!(ages, vec![Some(50), Some(73), None]);
    }

    #[tokio::test]
    async fn factory_registers_as_memory() {
        let repo = InMemoryRepositoryFactory
            .create(&DbConfig::default())
            .await
            .unwrap();

        assert_eq!(InMemoryRepositoryFactory.backend_name(), "memory");
        assert!(repo.list_plans().await.unwrap().is_empty());
    }
}
