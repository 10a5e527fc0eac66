use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use retire_core::{
    AccountStateRecord, AccountType, Milestone, MilestoneType, NewAccountState, NewMilestone,
    NewPlan, NewSnapshot, Plan, PlanAggregate, PlanRepository, RepositoryError, Snapshot,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use crate::decimal::{decimal_to_text, get_decimal, get_optional_decimal};

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connect to `database`.
    ///
    /// Accepts a sqlx URL (`sqlite:plans.db`), a bare file path which is
    /// created if missing, or `:memory:`.
    pub async fn new(database: &str) -> Result<Self> {
        let (url, max_connections) = connection_url(database);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename. A missing
    /// directory means there is nothing to seed.
    pub async fn run_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<()> {
        if !seeds_dir.is_dir() {
            debug!(dir = %seeds_dir.display(), "no seeds directory");
            return Ok(());
        }

        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            debug!(file = %path.display(), "applied seed");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn connection_url(database: &str) -> (String, u32) {
    match database {
        ":memory:" | "sqlite::memory:" => ("sqlite::memory:".to_string(), 1),
        url if url.starts_with("sqlite:") => (url.to_string(), 5),
        path => (format!("sqlite:{}?mode=rwc", path), 5),
    }
}

/// Maps insert failures, reporting a missing parent row as `NotFound`.
fn write_error(e: sqlx::Error) -> RepositoryError {
    match e.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => RepositoryError::NotFound,
        _ => RepositoryError::Database(e.to_string()),
    }
}

fn row_to_plan(row: &SqliteRow) -> Result<Plan, RepositoryError> {
    Ok(Plan {
        id: row
            .try_get("id")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        name: row
            .try_get("name")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        total_lifetime_tax: get_optional_decimal(row, "total_lifetime_tax")?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| RepositoryError::Database(format!("Failed to get created_at: {}", e)))?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(|e| RepositoryError::Database(format!("Failed to get updated_at: {}", e)))?,
    })
}

fn row_to_snapshot(row: &SqliteRow) -> Result<Snapshot, RepositoryError> {
    Ok(Snapshot {
        id: row
            .try_get("id")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        plan_id: row
            .try_get("plan_id")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        year: row
            .try_get("year")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        age: row
            .try_get("age")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        gross_income: get_decimal(row, "gross_income")?,
        net_income: get_decimal(row, "net_income")?,
        total_expenses: get_decimal(row, "total_expenses")?,
        total_assets: get_decimal(row, "total_assets")?,
        total_liabilities: get_decimal(row, "total_liabilities")?,
        net_worth: get_decimal(row, "net_worth")?,
        taxes_paid: get_decimal(row, "taxes_paid")?,
        cumulative_tax: get_decimal(row, "cumulative_tax")?,
    })
}

fn row_to_account_state(row: &SqliteRow) -> Result<AccountStateRecord, RepositoryError> {
    let account_type: String = row
        .try_get("account_type")
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

    Ok(AccountStateRecord {
        id: row
            .try_get("id")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        snapshot_id: row
            .try_get("snapshot_id")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        account_type: AccountType::parse(&account_type).ok_or_else(|| {
            RepositoryError::Database(format!("Unknown account type '{}'", account_type))
        })?,
        account_name: row
            .try_get("account_name")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        balance: get_decimal(row, "balance")?,
        contribution: get_decimal(row, "contribution")?,
        withdrawal: get_decimal(row, "withdrawal")?,
        growth: get_decimal(row, "growth")?,
    })
}

fn row_to_milestone(row: &SqliteRow) -> Result<Milestone, RepositoryError> {
    let milestone_type: String = row
        .try_get("milestone_type")
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

    Ok(Milestone {
        id: row
            .try_get("id")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        plan_id: row
            .try_get("plan_id")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        milestone_type: MilestoneType::parse(&milestone_type).ok_or_else(|| {
            RepositoryError::Database(format!("Unknown milestone type '{}'", milestone_type))
        })?,
        title: row
            .try_get("title")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        description: row
            .try_get("description")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        target_year: row
            .try_get("target_year")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        target_age: row
            .try_get("target_age")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        category: row
            .try_get("category")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        color: row
            .try_get("color")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        icon: row
            .try_get("icon")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
    })
}

#[async_trait]
impl PlanRepository for SqliteRepository {
    async fn create_plan(
        &self,
        plan: &NewPlan,
    ) -> Result<Plan, RepositoryError> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO plans (user_id, name, total_lifetime_tax, created_at, updated_at)
             VALUES (?, ?, NULL, ?, ?)",
        )
        .bind(plan.user_id)
        .bind(&plan.name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_plan(id).await
    }

    async fn get_plan(
        &self,
        id: i64,
    ) -> Result<Plan, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, name, total_lifetime_tax, created_at, updated_at
             FROM plans WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?
        .ok_or(RepositoryError::NotFound)?;

        row_to_plan(&row)
    }

    async fn list_plans(&self) -> Result<Vec<Plan>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, total_lifetime_tax, created_at, updated_at
             FROM plans ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.iter().map(row_to_plan).collect()
    }

    async fn delete_plan(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        sqlx::query(
            "DELETE FROM account_states
             WHERE snapshot_id IN (SELECT id FROM snapshots WHERE plan_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        for statement in [
            "DELETE FROM snapshots WHERE plan_id = ?",
            "DELETE FROM milestones WHERE plan_id = ?",
        ] {
            sqlx::query(statement)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Database(e.to_string()))?;
        }

        let result = sqlx::query("DELETE FROM plans WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_plan_aggregate(
        &self,
        plan_id: i64,
        aggregate: PlanAggregate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE plans SET total_lifetime_tax = ?, updated_at = ? WHERE id = ?",
        )
        .bind(aggregate.total_lifetime_tax.map(decimal_to_text))
        .bind(Utc::now())
        .bind(plan_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Clears the plan's snapshots, account states and milestones in one
    /// transaction.
    async fn delete_generated_data(
        &self,
        plan_id: i64,
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        sqlx::query("SELECT id FROM plans WHERE id = ?")
            .bind(plan_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?
            .ok_or(RepositoryError::NotFound)?;

        let states = sqlx::query(
            "DELETE FROM account_states
             WHERE snapshot_id IN (SELECT id FROM snapshots WHERE plan_id = ?)",
        )
        .bind(plan_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let snapshots = sqlx::query("DELETE FROM snapshots WHERE plan_id = ?")
            .bind(plan_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let milestones = sqlx::query("DELETE FROM milestones WHERE plan_id = ?")
            .bind(plan_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        debug!(
            plan_id,
            snapshots = snapshots.rows_affected(),
            account_states = states.rows_affected(),
            milestones = milestones.rows_affected(),
            "cleared generated data"
        );
        Ok(())
    }

    async fn create_snapshot(
        &self,
        plan_id: i64,
        snapshot: &NewSnapshot,
    ) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO snapshots (
                plan_id, year, age, gross_income, net_income, total_expenses,
                total_assets, total_liabilities, net_worth, taxes_paid, cumulative_tax
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(plan_id)
        .bind(snapshot.year)
        .bind(snapshot.age)
        .bind(decimal_to_text(snapshot.gross_income))
        .bind(decimal_to_text(snapshot.net_income))
        .bind(decimal_to_text(snapshot.total_expenses))
        .bind(decimal_to_text(snapshot.total_assets))
        .bind(decimal_to_text(snapshot.total_liabilities))
        .bind(decimal_to_text(snapshot.net_worth))
        .bind(decimal_to_text(snapshot.taxes_paid))
        .bind(decimal_to_text(snapshot.cumulative_tax))
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(result.last_insert_rowid())
    }

    async fn create_account_state(
        &self,
        snapshot_id: i64,
        state: &NewAccountState,
    ) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO account_states (
                snapshot_id, account_type, account_name, balance, contribution, withdrawal, growth
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(snapshot_id)
        .bind(state.account_type.as_str())
        .bind(&state.account_name)
        .bind(decimal_to_text(state.balance))
        .bind(decimal_to_text(state.contribution))
        .bind(decimal_to_text(state.withdrawal))
        .bind(decimal_to_text(state.growth))
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(result.last_insert_rowid())
    }

    async fn create_milestone(
        &self,
        milestone: &NewMilestone,
    ) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO milestones (
                plan_id, user_id, milestone_type, title, description,
                target_year, target_age, category, color, icon
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(milestone.plan_id)
        .bind(milestone.user_id)
        .bind(milestone.milestone_type.as_str())
        .bind(&milestone.title)
        .bind(&milestone.description)
        .bind(milestone.target_year)
        .bind(milestone.target_age)
        .bind(&milestone.category)
        .bind(&milestone.color)
        .bind(&milestone.icon)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(result.last_insert_rowid())
    }

    async fn list_snapshots(
        &self,
        plan_id: i64,
    ) -> Result<Vec<Snapshot>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, plan_id, year, age, gross_income, net_income, total_expenses,
                    total_assets, total_liabilities, net_worth, taxes_paid, cumulative_tax
             FROM snapshots WHERE plan_id = ? ORDER BY age, id",
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.iter().map(row_to_snapshot).collect()
    }

    async fn list_account_states(
        &self,
        snapshot_id: i64,
    ) -> Result<Vec<AccountStateRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, snapshot_id, account_type, account_name, balance, contribution,
                    withdrawal, growth
             FROM account_states WHERE snapshot_id = ? ORDER BY id",
        )
        .bind(snapshot_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.iter().map(row_to_account_state).collect()
    }

    async fn list_milestones(
        &self,
        plan_id: i64,
    ) -> Result<Vec<Milestone>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, plan_id, user_id, milestone_type, title, description,
                    target_year, target_age, category, color, icon
             FROM milestones WHERE plan_id = ?
             ORDER BY target_age IS NULL, target_age, id",
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.iter().map(row_to_milestone).collect()
    }
}
