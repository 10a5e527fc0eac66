use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountState, AccountType, AnnualProjection};

/// A persisted year of a plan's projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub plan_id: i64,
    pub year: i32,
    pub age: i32,
    pub gross_income: Decimal,
    pub net_income: Decimal,
    pub total_expenses: Decimal,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub net_worth: Decimal,
    pub taxes_paid: Decimal,
    pub cumulative_tax: Decimal,
}

/// For creating new snapshots (no id or owning plan)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub year: i32,
    pub age: i32,
    pub gross_income: Decimal,
    pub net_income: Decimal,
    pub total_expenses: Decimal,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub net_worth: Decimal,
    pub taxes_paid: Decimal,
    pub cumulative_tax: Decimal,
}

impl From<&AnnualProjection> for NewSnapshot {
    fn from(projection: &AnnualProjection) -> Self {
        Self {
            year: projection.year,
            age: projection.age,
            gross_income: projection.gross_income,
            net_income: projection.net_income,
            total_expenses: projection.total_expenses,
            total_assets: projection.total_assets,
            total_liabilities: projection.total_liabilities,
            net_worth: projection.net_worth,
            taxes_paid: projection.taxes_paid,
            cumulative_tax: projection.cumulative_tax,
        }
    }
}

impl Snapshot {
    /// The scalar fields without the storage identity, for comparing runs.
    pub fn values(&self) -> NewSnapshot {
        NewSnapshot {
            year: self.year,
            age: self.age,
            gross_income: self.gross_income,
            net_income: self.net_income,
            total_expenses: self.total_expenses,
            total_assets: self.total_assets,
            total_liabilities: self.total_liabilities,
            net_worth: self.net_worth,
            taxes_paid: self.taxes_paid,
            cumulative_tax: self.cumulative_tax,
        }
    }
}

/// A persisted account bucket belonging to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStateRecord {
    pub id: i64,
    pub snapshot_id: i64,
    pub account_type: AccountType,
    pub account_name: String,
    pub balance: Decimal,
    pub contribution: Decimal,
    pub withdrawal: Decimal,
    pub growth: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccountState {
    pub account_type: AccountType,
    pub account_name: String,
    pub balance: Decimal,
    pub contribution: Decimal,
    pub withdrawal: Decimal,
    pub growth: Decimal,
}

impl From<&AccountState> for NewAccountState {
    fn from(state: &AccountState) -> Self {
        Self {
            account_type: state.account_type,
            account_name: state.account_type.display_name().to_string(),
            balance: state.balance,
            contribution: state.contribution,
            withdrawal: state.withdrawal,
            growth: state.growth,
        }
    }
}
