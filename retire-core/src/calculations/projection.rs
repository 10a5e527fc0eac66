//! Year-by-year retirement projection.
//!
//! The simulation is a pure step function threaded through an explicit
//! fold: [`ProjectionCalculator::step`] maps the state left by one year and
//! the next age to the new state plus that age's [`AnnualProjection`].
//! [`ProjectionCalculator::run`] folds the step over `start_age..=end_age`.
//!
//! # Year structure
//!
//! | Step | Working years | Retired years |
//! |------|---------------|---------------|
//! | Gross income | salary × inflation index | withdrawal rate × opening assets + social security + pension |
//! | Net income | gross × working retention | gross × retired retention |
//! | Expenses | working baseline × inflation index | retirement spending × inflation index |
//! | Contributions | capped salary deferral + surplus take-home | none |
//! | Withdrawals | take-home shortfall | expenses not covered by social security and pension |
//! | Growth | portfolio rate for equity buckets, bond rate for cash | same |
//!
//! The liability is amortized by a level payment and taxes accumulate as
//! `gross - net` every year.

use rust_decimal::Decimal;

use crate::calculations::common::{checked_compound, compound, non_negative, round_half_up};
use crate::calculations::ledger::{AccountLedger, AllocationPolicy, BucketValues, Contribution};
use crate::models::{
    AccountState, AccountType, AnnualProjection, GrowthClass, InvalidParameters, Phase,
    PlanParameters, ProjectionAssumptions,
};

/// Everything carried from one simulated year to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionState {
    /// Bucket balances at the end of the previous year.
    pub balances: BucketValues,
    pub liability_balance: Decimal,
    pub cumulative_tax: Decimal,
    /// `(1 + inflation)^(age - start_age)` for the age about to be simulated.
    pub inflation_index: Decimal,
}

/// Headline figures over a whole projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionSummary {
    pub years: usize,
    pub total_lifetime_tax: Decimal,
    pub peak_assets: Decimal,
    pub final_net_worth: Decimal,
    /// First age from which total assets stay at zero until the end.
    pub depleted_at_age: Option<i32>,
}

impl ProjectionSummary {
    pub fn from_projections(projections: &[AnnualProjection]) -> Option<Self> {
        let last = projections.last()?;
        let peak_assets = projections
            .iter()
            .map(|p| p.total_assets)
            .max()
            .unwrap_or(Decimal::ZERO);

        let depleted_from = projections
            .iter()
            .rposition(|p| !p.is_depleted())
            .map_or(0, |i| i + 1);
        let depleted_at_age = projections.get(depleted_from).map(|p| p.age);

        Some(Self {
            years: projections.len(),
            total_lifetime_tax: last.cumulative_tax,
            peak_assets,
            final_net_worth: last.net_worth,
            depleted_at_age,
        })
    }
}

/// Deterministic projection of one plan.
#[derive(Debug, Clone)]
pub struct ProjectionCalculator<'a> {
    params: &'a PlanParameters,
    assumptions: &'a ProjectionAssumptions,
    ledger: AccountLedger<'a>,
    liability_payment: Decimal,
}

impl<'a> ProjectionCalculator<'a> {
    /// Creates a calculator for validated parameters.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameters`] if `params` fail validation.
    pub fn new(
        params: &'a PlanParameters,
        assumptions: &'a ProjectionAssumptions,
        policy: &'a dyn AllocationPolicy,
    ) -> Result<Self, InvalidParameters> {
        params.validate()?;
        assumptions.validate()?;
        Ok(Self {
            params,
            assumptions,
            ledger: AccountLedger::new(policy),
            liability_payment: level_payment(params),
        })
    }

    /// The fixed annual payment made against the liability.
    pub fn liability_payment(&self) -> Decimal {
        self.liability_payment
    }

    /// State before the first simulated year.
    pub fn initial_state(&self) -> ProjectionState {
        ProjectionState {
            balances: self.ledger.open(self.params.initial_net_worth),
            liability_balance: self
                .params
                .liability
                .as_ref()
                .map_or(Decimal::ZERO, |l| round_half_up(l.balance)),
            cumulative_tax: Decimal::ZERO,
            inflation_index: Decimal::ONE,
        }
    }

    /// Runs every age from `start_age` to `end_age` inclusive.
    pub fn run(&self) -> Vec<AnnualProjection> {
        (self.params.start_age..=self.params.end_age)
            .scan(self.initial_state(), |state, age| {
                let (next, projection) = self.step(state, age);
                *state = next;
                Some(projection)
            })
            .collect()
    }

    /// Simulates a single age.
    pub fn step(
        &self,
        previous: &ProjectionState,
        age: i32,
    ) -> (ProjectionState, AnnualProjection) {
        let params = self.params;
        let assumptions = self.assumptions;
        let phase = self.phase(age);
        let index = previous.inflation_index;
        let opening_assets = previous.balances.total();

        let total_expenses = round_half_up(self.expense_baseline(phase) * index);

        let (gross_income, net_income, contribution, withdrawal_total) = match phase {
            Phase::Working => {
                let gross = round_half_up(params.current_annual_income * index);
                let net = round_half_up(gross * assumptions.working_tax_retention);
                let retirement = round_half_up(
                    (gross * assumptions.contribution_rate)
                        .min(assumptions.contribution_limit_at(age)),
                );
                let surplus = net - retirement - total_expenses;
                let contribution = Contribution {
                    retirement,
                    savings: non_negative(surplus),
                };
                (gross, net, contribution, non_negative(-surplus))
            }
            Phase::Retired => {
                let fixed_income = self.social_security_income(age) + params.pension_income;
                let gross = round_half_up(assumptions.withdrawal_rate * opening_assets) + fixed_income;
                let net = round_half_up(gross * assumptions.retired_tax_retention);
                let withdrawal = non_negative(total_expenses - fixed_income);
                (gross, net, Contribution::default(), withdrawal)
            }
        };

        let deltas = self
            .ledger
            .apply(contribution, withdrawal_total, &previous.balances);
        let settled = deltas.settle(&previous.balances);

        let mut balances = BucketValues::zero();
        let mut accounts = Vec::with_capacity(AccountType::ALL.len());
        for account in AccountType::ALL {
            let rate = match account.growth_class() {
                GrowthClass::Equity => params.portfolio_growth_rate,
                GrowthClass::Bond => params.bond_growth_rate,
            };
            let growth = round_half_up(settled[account] * rate);
            let balance = non_negative(settled[account] + growth);
            balances[account] = balance;
            accounts.push(AccountState {
                account_type: account,
                balance,
                contribution: deltas.contributions[account],
                withdrawal: deltas.withdrawals[account],
                growth: balance - settled[account],
            });
        }

        let total_assets = balances.total();
        let total_liabilities = self.amortize(previous.liability_balance, age);
        let taxes_paid = non_negative(gross_income - net_income);
        let cumulative_tax = previous.cumulative_tax + taxes_paid;

        let projection = AnnualProjection {
            year: params.year_for_age(age),
            age,
            phase,
            gross_income,
            net_income,
            total_expenses,
            taxes_paid,
            cumulative_tax,
            total_assets,
            total_liabilities,
            net_worth: total_assets - total_liabilities,
            accounts,
        };

        let next = ProjectionState {
            balances,
            liability_balance: total_liabilities,
            cumulative_tax,
            inflation_index: compound(index, params.inflation_rate),
        };

        (next, projection)
    }

    fn phase(
        &self,
        age: i32,
    ) -> Phase {
        if age < self.params.retirement_age {
            Phase::Working
        } else {
            Phase::Retired
        }
    }

    fn expense_baseline(
        &self,
        phase: Phase,
    ) -> Decimal {
        match phase {
            Phase::Working => self.params.working_expense_baseline(),
            Phase::Retired => self.params.desired_annual_retirement_spending,
        }
    }

    /// Social security received at `age`, including any spouse benefit.
    fn social_security_income(
        &self,
        age: i32,
    ) -> Decimal {
        let params = self.params;
        let mut income = Decimal::ZERO;
        if age >= params.social_security_start_age {
            income += params.estimated_social_security_benefit;
        }
        if let (Some(start), Some(benefit)) = (
            params.spouse_social_security_start_age,
            params.spouse_estimated_social_security_benefit,
        ) {
            if age >= start {
                income += benefit;
            }
        }
        income
    }

    /// Liability balance after the payment made at `age`.
    fn amortize(
        &self,
        balance: Decimal,
        age: i32,
    ) -> Decimal {
        let Some(liability) = &self.params.liability else {
            return Decimal::ZERO;
        };
        if balance <= Decimal::ZERO || age >= liability.payoff_age - 1 {
            return Decimal::ZERO;
        }

        let interest = round_half_up(balance * liability.interest_rate);
        let principal = non_negative(self.liability_payment - interest);
        non_negative(balance - principal)
    }
}

/// Level annual payment that retires the liability by its payoff age.
fn level_payment(params: &PlanParameters) -> Decimal {
    let Some(liability) = &params.liability else {
        return Decimal::ZERO;
    };
    let years = liability.payoff_age - params.start_age;
    if liability.balance <= Decimal::ZERO || years <= 0 {
        return Decimal::ZERO;
    }

    let rate = liability.interest_rate;
    if rate.is_zero() {
        return round_half_up(liability.balance / Decimal::from(years));
    }

    // Past the representable range f / (f - 1) is 1 to any useful precision.
    let interest_only = liability.balance * rate;
    let factor = (0..years).try_fold(Decimal::ONE, |factor, _| checked_compound(factor, rate));
    let payment = factor
        .and_then(|f| {
            interest_only
                .checked_mul(f)?
                .checked_div(f - Decimal::ONE)
        })
        .unwrap_or(interest_only);
    round_half_up(payment)
}
