use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AccountType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Working,
    Retired,
}

/// One bucket's activity for a single simulated year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub account_type: AccountType,
    /// Balance at the end of the year, after growth.
    pub balance: Decimal,
    pub contribution: Decimal,
    pub withdrawal: Decimal,
    pub growth: Decimal,
}

/// The computed financial state for one age of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualProjection {
    pub year: i32,
    pub age: i32,
    pub phase: Phase,
    pub gross_income: Decimal,
    pub net_income: Decimal,
    pub total_expenses: Decimal,
    pub taxes_paid: Decimal,
    pub cumulative_tax: Decimal,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub net_worth: Decimal,
    /// One entry per bucket, in [`AccountType::ALL`] order.
    pub accounts: Vec<AccountState>,
}

impl AnnualProjection {
    pub fn account(
        &self,
        account_type: AccountType,
    ) -> Option<&AccountState> {
        self.accounts
            .iter()
            .find(|state| state.account_type == account_type)
    }

    pub fn is_depleted(&self) -> bool {
        self.total_assets.is_zero()
    }
}
