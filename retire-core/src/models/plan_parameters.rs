//! Plan inputs and their validation.
//!
//! [`PlanParametersInput`] is what a form or a plan file submits: every field
//! is optional. [`PlanParametersInput::validate`] turns it into the immutable
//! [`PlanParameters`] a generation run consumes, or reports the first problem
//! as an [`InvalidParameters`] error before any work is done.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Oldest age a plan may project to.
pub const MAX_PLAN_AGE: i32 = 120;

/// Largest amount, in whole currency units, any single input may carry.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Upper bound on any value the projection may reach, well inside `Decimal`.
const VALUE_CEILING: i128 = 1_000_000_000_000_000_000_000_000;

/// Errors raised while validating plan parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidParameters {
    #[error("required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("retirement age {retirement_age} must be after start age {start_age}")]
    RetirementNotAfterStart { start_age: i32, retirement_age: i32 },

    #[error("end age {end_age} must be after retirement age {retirement_age}")]
    EndNotAfterRetirement { retirement_age: i32, end_age: i32 },

    #[error("'{field}' must not be negative (got {value})")]
    NegativeAmount { field: &'static str, value: Decimal },

    #[error("'{field}' exceeds the maximum of {max} (got {value})", max = MAX_AMOUNT)]
    AmountTooLarge { field: &'static str, value: Decimal },

    #[error("'{field}' must be greater than -1 and at most 1 (got {value})")]
    RateOutOfRange { field: &'static str, value: Decimal },

    #[error("'{field}' must be between 0 and 1 (got {value})")]
    FractionOutOfRange { field: &'static str, value: Decimal },

    #[error("projected values outgrow the supported range by age {age}")]
    ExceedsRange { age: i32 },

    #[error("'{field}' is not a valid age (got {value})")]
    InvalidAge { field: &'static str, value: i32 },

    #[error("invalid liability: {0}")]
    InvalidLiability(String),
}

/// A single mortgage-like liability amortized by a level annual payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiabilityParameters {
    pub balance: Decimal,
    pub interest_rate: Decimal,
    /// Age by which the liability is fully paid off.
    pub payoff_age: i32,
}

/// Validated, immutable description of one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanParameters {
    /// Calendar year in which the plan holder is `start_age`.
    pub start_year: i32,
    pub start_age: i32,
    pub retirement_age: i32,
    pub end_age: i32,

    // Rates, as fractions of 1
    pub portfolio_growth_rate: Decimal,
    pub bond_growth_rate: Decimal,
    pub inflation_rate: Decimal,

    pub social_security_start_age: i32,
    pub estimated_social_security_benefit: Decimal,
    pub spouse_social_security_start_age: Option<i32>,
    pub spouse_estimated_social_security_benefit: Option<Decimal>,

    pub current_annual_income: Decimal,
    pub working_annual_expenses: Option<Decimal>,
    pub desired_annual_retirement_spending: Decimal,
    pub pension_income: Decimal,
    pub initial_net_worth: Decimal,

    pub liability: Option<LiabilityParameters>,
}

impl PlanParameters {
    /// Number of simulated years, `end_age - start_age + 1`.
    pub fn years(&self) -> usize {
        (self.end_age - self.start_age + 1) as usize
    }

    /// Calendar year label for `age`.
    pub fn year_for_age(&self, age: i32) -> i32 {
        self.start_year + (age - self.start_age)
    }

    /// Expense baseline for the working years.
    pub fn working_expense_baseline(&self) -> Decimal {
        self.working_annual_expenses
            .unwrap_or(self.desired_annual_retirement_spending)
    }

    /// Checks every invariant a generation run depends on.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule as an [`InvalidParameters`].
    pub fn validate(&self) -> Result<(), InvalidParameters> {
        if self.start_age < 0 {
            return Err(InvalidParameters::InvalidAge {
                field: "start_age",
                value: self.start_age,
            });
        }
        if self.retirement_age <= self.start_age {
            return Err(InvalidParameters::RetirementNotAfterStart {
                start_age: self.start_age,
                retirement_age: self.retirement_age,
            });
        }
        if self.end_age <= self.retirement_age {
            return Err(InvalidParameters::EndNotAfterRetirement {
                retirement_age: self.retirement_age,
                end_age: self.end_age,
            });
        }
        if self.end_age > MAX_PLAN_AGE {
            return Err(InvalidParameters::InvalidAge {
                field: "end_age",
                value: self.end_age,
            });
        }
        check_age("social_security_start_age", self.social_security_start_age)?;
        if let Some(age) = self.spouse_social_security_start_age {
            check_age("spouse_social_security_start_age", age)?;
        }
        match (
            self.spouse_social_security_start_age,
            self.spouse_estimated_social_security_benefit,
        ) {
            (Some(_), None) => {
                return Err(InvalidParameters::MissingField(
                    "spouse_estimated_social_security_benefit",
                ));
            }
            (None, Some(_)) => {
                return Err(InvalidParameters::MissingField(
                    "spouse_social_security_start_age",
                ));
            }
            _ => {}
        }

        check_rate("portfolio_growth_rate", self.portfolio_growth_rate)?;
        check_rate("bond_growth_rate", self.bond_growth_rate)?;
        check_rate("inflation_rate", self.inflation_rate)?;

        check_amount(
            "estimated_social_security_benefit",
            self.estimated_social_security_benefit,
        )?;
        if let Some(benefit) = self.spouse_estimated_social_security_benefit {
            check_amount("spouse_estimated_social_security_benefit", benefit)?;
        }
        check_amount("current_annual_income", self.current_annual_income)?;
        if let Some(expenses) = self.working_annual_expenses {
            check_amount("working_annual_expenses", expenses)?;
        }
        check_amount(
            "desired_annual_retirement_spending",
            self.desired_annual_retirement_spending,
        )?;
        check_amount("pension_income", self.pension_income)?;
        if self.initial_net_worth.abs() > Decimal::from(MAX_AMOUNT) {
            return Err(InvalidParameters::AmountTooLarge {
                field: "initial_net_worth",
                value: self.initial_net_worth,
            });
        }

        if let Some(liability) = &self.liability {
            if liability.balance < Decimal::ZERO {
                return Err(InvalidParameters::InvalidLiability(format!(
                    "balance must not be negative (got {})",
                    liability.balance
                )));
            }
            if liability.balance > Decimal::from(MAX_AMOUNT) {
                return Err(InvalidParameters::InvalidLiability(format!(
                    "balance exceeds the maximum of {} (got {})",
                    MAX_AMOUNT, liability.balance
                )));
            }
            if liability.interest_rate < Decimal::ZERO || liability.interest_rate > Decimal::ONE {
                return Err(InvalidParameters::InvalidLiability(format!(
                    "interest rate must be between 0 and 1 (got {})",
                    liability.interest_rate
                )));
            }
            if liability.payoff_age > MAX_PLAN_AGE {
                return Err(InvalidParameters::InvalidLiability(format!(
                    "payoff age {} is past the maximum plan age {}",
                    liability.payoff_age, MAX_PLAN_AGE
                )));
            }
            if liability.balance > Decimal::ZERO && liability.payoff_age <= self.start_age {
                return Err(InvalidParameters::InvalidLiability(format!(
                    "payoff age {} must be after start age {}",
                    liability.payoff_age, self.start_age
                )));
            }
        }

        self.check_headroom()
    }

    /// Rejects plans whose compounded values would outgrow `Decimal`.
    ///
    /// The asset path is bounded by saving every income and spending amount
    /// each year and growing the total at the fastest of the plan's rates.
    fn check_headroom(&self) -> Result<(), InvalidParameters> {
        let ceiling = Decimal::from_i128_with_scale(VALUE_CEILING, 0);
        let growth = Decimal::ONE
            + self
                .portfolio_growth_rate
                .max(self.bond_growth_rate)
                .max(Decimal::ZERO);
        let inflation = Decimal::ONE + self.inflation_rate.max(Decimal::ZERO);
        let flows: Decimal = [
            self.current_annual_income,
            self.working_expense_baseline(),
            self.desired_annual_retirement_spending,
            self.estimated_social_security_benefit,
            self.spouse_estimated_social_security_benefit
                .unwrap_or(Decimal::ZERO),
            self.pension_income,
        ]
        .into_iter()
        .sum();

        let mut index = Decimal::ONE;
        let mut assets = self.initial_net_worth.max(Decimal::ZERO);
        for age in self.start_age..=self.end_age {
            let next = flows
                .checked_mul(index)
                .and_then(|inflow| assets.checked_add(inflow))
                .and_then(|total| total.checked_mul(growth))
                .zip(index.checked_mul(inflation))
                .filter(|(a, i)| *a <= ceiling && *i <= ceiling);
            let Some((next_assets, next_index)) = next else {
                return Err(InvalidParameters::ExceedsRange { age });
            };
            assets = next_assets;
            index = next_index;
        }
        Ok(())
    }
}

/// Validates `params` and hands them back unchanged.
///
/// # Errors
///
/// See [`PlanParameters::validate`].
pub fn validate_plan_parameters(params: PlanParameters) -> Result<PlanParameters, InvalidParameters> {
    params.validate()?;
    Ok(params)
}

fn check_rate(
    field: &'static str,
    value: Decimal,
) -> Result<(), InvalidParameters> {
    if value <= Decimal::NEGATIVE_ONE || value > Decimal::ONE {
        return Err(InvalidParameters::RateOutOfRange { field, value });
    }
    Ok(())
}

fn check_fraction(
    field: &'static str,
    value: Decimal,
) -> Result<(), InvalidParameters> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(InvalidParameters::FractionOutOfRange { field, value });
    }
    Ok(())
}

fn check_age(
    field: &'static str,
    value: i32,
) -> Result<(), InvalidParameters> {
    if !(0..=MAX_PLAN_AGE).contains(&value) {
        return Err(InvalidParameters::InvalidAge { field, value });
    }
    Ok(())
}

fn check_amount(
    field: &'static str,
    value: Decimal,
) -> Result<(), InvalidParameters> {
    if value < Decimal::ZERO {
        return Err(InvalidParameters::NegativeAmount { field, value });
    }
    if value > Decimal::from(MAX_AMOUNT) {
        return Err(InvalidParameters::AmountTooLarge { field, value });
    }
    Ok(())
}

/// Unvalidated plan parameters as submitted by a form or plan file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanParametersInput {
    pub start_year: Option<i32>,
    pub start_age: Option<i32>,
    pub retirement_age: Option<i32>,
    pub end_age: Option<i32>,
    pub portfolio_growth_rate: Option<Decimal>,
    pub bond_growth_rate: Option<Decimal>,
    pub inflation_rate: Option<Decimal>,
    pub social_security_start_age: Option<i32>,
    pub estimated_social_security_benefit: Option<Decimal>,
    pub spouse_social_security_start_age: Option<i32>,
    pub spouse_estimated_social_security_benefit: Option<Decimal>,
    pub current_annual_income: Option<Decimal>,
    pub working_annual_expenses: Option<Decimal>,
    pub desired_annual_retirement_spending: Option<Decimal>,
    /// Defaults to zero when absent.
    pub pension_income: Option<Decimal>,
    pub initial_net_worth: Option<Decimal>,
    pub liability: Option<LiabilityParameters>,
}

impl PlanParametersInput {
    /// Fills in required fields and validates the result.
    ///
    /// # Errors
    ///
    /// [`InvalidParameters::MissingField`] for the first absent required
    /// field, otherwise anything [`PlanParameters::validate`] reports.
    pub fn validate(self) -> Result<PlanParameters, InvalidParameters> {
        let params = PlanParameters {
            start_year: required("start_year", self.start_year)?,
            start_age: required("start_age", self.start_age)?,
            retirement_age: required("retirement_age", self.retirement_age)?,
            end_age: required("end_age", self.end_age)?,
            portfolio_growth_rate: required("portfolio_growth_rate", self.portfolio_growth_rate)?,
            bond_growth_rate: required("bond_growth_rate", self.bond_growth_rate)?,
            inflation_rate: required("inflation_rate", self.inflation_rate)?,
            social_security_start_age: required(
                "social_security_start_age",
                self.social_security_start_age,
            )?,
            estimated_social_security_benefit: required(
                "estimated_social_security_benefit",
                self.estimated_social_security_benefit,
            )?,
            spouse_social_security_start_age: self.spouse_social_security_start_age,
            spouse_estimated_social_security_benefit: self.spouse_estimated_social_security_benefit,
            current_annual_income: required("current_annual_income", self.current_annual_income)?,
            working_annual_expenses: self.working_annual_expenses,
            desired_annual_retirement_spending: required(
                "desired_annual_retirement_spending",
                self.desired_annual_retirement_spending,
            )?,
            pension_income: self.pension_income.unwrap_or(Decimal::ZERO),
            initial_net_worth: required("initial_net_worth", self.initial_net_worth)?,
            liability: self.liability,
        };

        validate_plan_parameters(params)
    }
}

fn required<T>(
    field: &'static str,
    value: Option<T>,
) -> Result<T, InvalidParameters> {
    value.ok_or(InvalidParameters::MissingField(field))
}

/// Tunable constants of the projection model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionAssumptions {
    /// Share of investable assets counted as retirement income each year.
    pub withdrawal_rate: Decimal,
    /// Net-to-gross income factor while working.
    pub working_tax_retention: Decimal,
    /// Net-to-gross income factor once retired.
    pub retired_tax_retention: Decimal,
    /// Share of gross salary directed to retirement accounts.
    pub contribution_rate: Decimal,
    pub contribution_limit: Decimal,
    pub catch_up_contribution_limit: Decimal,
    pub catch_up_age: i32,
}

impl Default for ProjectionAssumptions {
    fn default() -> Self {
        Self {
            withdrawal_rate: Decimal::new(4, 2),
            working_tax_retention: Decimal::new(75, 2),
            retired_tax_retention: Decimal::new(85, 2),
            contribution_rate: Decimal::new(15, 2),
            contribution_limit: Decimal::new(23_000, 0),
            catch_up_contribution_limit: Decimal::new(30_500, 0),
            catch_up_age: 50,
        }
    }
}

impl ProjectionAssumptions {
    /// Checks that every share is a fraction and every limit is an amount.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule as an [`InvalidParameters`].
    pub fn validate(&self) -> Result<(), InvalidParameters> {
        check_fraction("withdrawal_rate", self.withdrawal_rate)?;
        check_fraction("working_tax_retention", self.working_tax_retention)?;
        check_fraction("retired_tax_retention", self.retired_tax_retention)?;
        check_fraction("contribution_rate", self.contribution_rate)?;
        check_amount("contribution_limit", self.contribution_limit)?;
        check_amount("catch_up_contribution_limit", self.catch_up_contribution_limit)?;
        check_age("catch_up_age", self.catch_up_age)
    }

    /// Annual retirement contribution ceiling at `age`.
    pub fn contribution_limit_at(&self, age: i32) -> Decimal {
        if age >= self.catch_up_age {
            self.catch_up_contribution_limit
        } else {
            self.contribution_limit
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn complete_input() -> PlanParametersInput {
        PlanParametersInput {
            start_year: Some(2025),
            start_age: Some(30),
            retirement_age: Some(65),
            end_age: Some(95),
            portfolio_growth_rate: Some(dec!(0.07)),
            bond_growth_rate: Some(dec!(0.03)),
            inflation_rate: Some(dec!(0.03)),
            social_security_start_age: Some(67),
            estimated_social_security_benefit: Some(dec!(24000)),
            current_annual_income: Some(dec!(90000)),
            desired_annual_retirement_spending: Some(dec!(60000)),
            initial_net_worth: Some(dec!(50000)),
            ..Default::default()
        }
    }

    #[test]
    fn complete_input_validates() {
        let params = complete_input().validate().expect("input should validate");

        assert_eq!(params.start_age, 30);
        assert_eq!(params.pension_income, Decimal::ZERO);
        assert_eq!(params.years(), 66);
    }

    #[test]
    fn missing_rate_is_reported_by_name() {
        let input = PlanParametersInput {
            inflation_rate: None,
            ..complete_input()
        };

        assert_eq!(
            input.validate(),
            Err(InvalidParameters::MissingField("inflation_rate"))
        );
    }

    #[test]
    fn retirement_must_follow_start() {
        let input = PlanParametersInput {
            retirement_age: Some(30),
            ..complete_input()
        };

        assert_eq!(
            input.validate(),
            Err(InvalidParameters::RetirementNotAfterStart {
                start_age: 30,
                retirement_age: 30,
            })
        );
    }

    #[test]
    fn end_must_follow_retirement() {
        let input = PlanParametersInput {
            end_age: Some(64),
            ..complete_input()
        };

        assert_eq!(
            input.validate(),
            Err(InvalidParameters::EndNotAfterRetirement {
                retirement_age: 65,
                end_age: 64,
            })
        );
    }

    #[test]
    fn end_age_is_capped() {
        let input = PlanParametersInput {
            end_age: Some(MAX_PLAN_AGE + 1),
            ..complete_input()
        };

        assert!(matches!(
            input.validate(),
            Err(InvalidParameters::InvalidAge { field: "end_age", .. })
        ));
    }

    #[test]
    fn rate_of_minus_one_is_rejected() {
        let input = PlanParametersInput {
            portfolio_growth_rate: Some(dec!(-1)),
            ..complete_input()
        };

        assert_eq!(
            input.validate(),
            Err(InvalidParameters::RateOutOfRange {
                field: "portfolio_growth_rate",
                value: dec!(-1),
            })
        );
    }

    #[test]
    fn rate_of_one_is_the_upper_bound() {
        let at_bound = PlanParametersInput {
            retirement_age: Some(40),
            end_age: Some(50),
            inflation_rate: Some(dec!(1)),
            ..complete_input()
        };
        let above = PlanParametersInput {
            inflation_rate: Some(dec!(1.01)),
            ..at_bound.clone()
        };

        assert!(at_bound.validate().is_ok());
        assert_eq!(
            above.validate(),
            Err(InvalidParameters::RateOutOfRange {
                field: "inflation_rate",
                value: dec!(1.01),
            })
        );
    }

    #[test]
    fn long_plan_at_full_inflation_exceeds_range() {
        let input = PlanParametersInput {
            end_age: Some(MAX_PLAN_AGE),
            inflation_rate: Some(dec!(1)),
            current_annual_income: Some(dec!(100000)),
            ..complete_input()
        };

        assert!(matches!(
            input.validate(),
            Err(InvalidParameters::ExceedsRange { .. })
        ));
    }

    #[test]
    fn amounts_above_maximum_are_rejected() {
        let input = PlanParametersInput {
            current_annual_income: Some(Decimal::from(MAX_AMOUNT) + dec!(1)),
            ..complete_input()
        };

        assert!(matches!(
            input.validate(),
            Err(InvalidParameters::AmountTooLarge {
                field: "current_annual_income",
                ..
            })
        ));
    }

    #[test]
    fn social_security_age_past_maximum_is_rejected() {
        let input = PlanParametersInput {
            social_security_start_age: Some(MAX_PLAN_AGE + 1),
            ..complete_input()
        };

        assert_eq!(
            input.validate(),
            Err(InvalidParameters::InvalidAge {
                field: "social_security_start_age",
                value: MAX_PLAN_AGE + 1,
            })
        );
    }

    #[test]
    fn liability_payoff_past_maximum_age_is_rejected() {
        let input = PlanParametersInput {
            liability: Some(LiabilityParameters {
                balance: dec!(200000),
                interest_rate: dec!(0.05),
                payoff_age: MAX_PLAN_AGE + 1,
            }),
            ..complete_input()
        };

        assert!(matches!(
            input.validate(),
            Err(InvalidParameters::InvalidLiability(_))
        ));
    }

    #[test]
    fn default_assumptions_validate() {
        assert_eq!(ProjectionAssumptions::default().validate(), Ok(()));
    }

    #[test]
    fn negative_spending_is_rejected() {
        let input = PlanParametersInput {
            desired_annual_retirement_spending: Some(dec!(-1)),
            ..complete_input()
        };

        assert!(matches!(
            input.validate(),
            Err(InvalidParameters::NegativeAmount {
                field: "desired_annual_retirement_spending",
                ..
            })
        ));
    }

    #[test]
    fn negative_net_worth_is_allowed() {
        let input = PlanParametersInput {
            initial_net_worth: Some(dec!(-20000)),
            ..complete_input()
        };

        assert!(input.validate().is_ok());
    }

    #[test]
    fn spouse_fields_must_come_together() {
        let input = PlanParametersInput {
            spouse_social_security_start_age: Some(67),
            ..complete_input()
        };

        assert_eq!(
            input.validate(),
            Err(InvalidParameters::MissingField(
                "spouse_estimated_social_security_benefit"
            ))
        );
    }

    #[test]
    fn liability_payoff_must_follow_start() {
        let input = PlanParametersInput {
            liability: Some(LiabilityParameters {
                balance: dec!(200000),
                interest_rate: dec!(0.05),
                payoff_age: 30,
            }),
            ..complete_input()
        };

        assert!(matches!(
            input.validate(),
            Err(InvalidParameters::InvalidLiability(_))
        ));
    }

    #[test]
    fn working_baseline_defaults_to_retirement_spending() {
        let params = complete_input().validate().unwrap();

        assert_eq!(params.working_expense_baseline(), dec!(60000));
    }

    #[test]
    fn year_labels_follow_start_year() {
        let params = complete_input().validate().unwrap();

        assert_eq!(params.year_for_age(30), 2025);
        assert_eq!(params.year_for_age(65), 2060);
    }

    #[test]
    fn catch_up_limit_applies_from_threshold() {
        let assumptions = ProjectionAssumptions::default();

        assert_eq!(assumptions.contribution_limit_at(49), dec!(23000));
        assert_eq!(assumptions.contribution_limit_at(50), dec!(30500));
    }
}
