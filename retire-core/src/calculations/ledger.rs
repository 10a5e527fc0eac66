//! Account ledger: how money moves in and out of the account buckets.
//!
//! The [`AccountLedger`] splits a year's contribution and withdrawal totals
//! across the buckets according to an [`AllocationPolicy`]. Whatever the
//! policy, the ledger guarantees conservation:
//!
//! * the per-bucket contributions sum exactly to the contribution total;
//! * the per-bucket withdrawals sum exactly to
//!   `min(withdrawal_total, Σ current balances)`, and no bucket gives up more
//!   than it holds.
//!
//! Withdrawals run in two passes. A proportional pass draws from each bucket
//! by the policy's withdrawal weights, clamped to the bucket balance. A
//! backfill pass then walks the policy's withdrawal order and takes whatever
//! is still owed from buckets that have money left.

use std::fmt::Debug;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::calculations::common::{non_negative, truncate_to_cents};
use crate::models::AccountType;

/// One decimal per account bucket, indexed by [`AccountType`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketValues([Decimal; 4]);

impl BucketValues {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(AccountType, Decimal)]) -> Self {
        let mut values = Self::zero();
        for (account, value) in pairs {
            values[*account] = *value;
        }
        values
    }

    pub fn total(&self) -> Decimal {
        self.0.iter().copied().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AccountType, Decimal)> + '_ {
        AccountType::ALL
            .into_iter()
            .map(move |account| (account, self[account]))
    }
}

impl Index<AccountType> for BucketValues {
    type Output = Decimal;

    fn index(
        &self,
        account: AccountType,
    ) -> &Decimal {
        &self.0[account.index()]
    }
}

impl IndexMut<AccountType> for BucketValues {
    fn index_mut(
        &mut self,
        account: AccountType,
    ) -> &mut Decimal {
        &mut self.0[account.index()]
    }
}

/// The two contribution streams of a working year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionStream {
    /// Salary deferrals into retirement accounts.
    Retirement,
    /// Take-home pay left over after expenses.
    Savings,
}

/// Contribution amounts for one year, by stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Contribution {
    pub retirement: Decimal,
    pub savings: Decimal,
}

impl Contribution {
    pub fn total(&self) -> Decimal {
        self.retirement + self.savings
    }
}

/// Per-bucket movements produced by [`AccountLedger::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerDeltas {
    pub contributions: BucketValues,
    pub withdrawals: BucketValues,
}

impl LedgerDeltas {
    /// Balances after the deltas are applied to `balances`.
    pub fn settle(
        &self,
        balances: &BucketValues,
    ) -> BucketValues {
        let mut settled = BucketValues::zero();
        for account in AccountType::ALL {
            settled[account] = non_negative(
                balances[account] + self.contributions[account] - self.withdrawals[account],
            );
        }
        settled
    }
}

/// Decides how money is spread across the account buckets.
///
/// Weights are relative; they need not sum to one. Buckets with a zero or
/// negative weight receive nothing from that split.
pub trait AllocationPolicy: Send + Sync + Debug {
    /// Short identifier used in plan files and logs.
    fn name(&self) -> &'static str;

    /// How a plan's starting net worth is spread across buckets.
    fn opening_weights(&self) -> BucketValues;

    fn contribution_weights(
        &self,
        stream: ContributionStream,
    ) -> BucketValues;

    /// Weights for the proportional withdrawal pass.
    fn withdrawal_weights(&self) -> BucketValues;

    /// Order in which the backfill pass draws from buckets.
    fn withdrawal_order(&self) -> Vec<AccountType>;
}

/// Fixed proportional weights per bucket type.
///
/// The default favours the tax-deferred bucket for contributions and draws
/// proportionally from the tax-deferred, Roth and brokerage buckets in
/// retirement, leaving cash for last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProportionalPolicy {
    pub opening: BucketValues,
    pub retirement_contributions: BucketValues,
    pub savings_contributions: BucketValues,
    pub withdrawals: BucketValues,
    pub order: Vec<AccountType>,
}

impl Default for ProportionalPolicy {
    fn default() -> Self {
        Self {
            opening: BucketValues::from_pairs(&[
                (AccountType::TaxDeferred, Decimal::new(50, 2)),
                (AccountType::Roth, Decimal::new(20, 2)),
                (AccountType::TaxableBrokerage, Decimal::new(20, 2)),
                (AccountType::Cash, Decimal::new(10, 2)),
            ]),
            retirement_contributions: BucketValues::from_pairs(&[
                (AccountType::TaxDeferred, Decimal::new(70, 2)),
                (AccountType::Roth, Decimal::new(30, 2)),
            ]),
            savings_contributions: BucketValues::from_pairs(&[
                (AccountType::TaxableBrokerage, Decimal::new(75, 2)),
                (AccountType::Cash, Decimal::new(25, 2)),
            ]),
            withdrawals: BucketValues::from_pairs(&[
                (AccountType::TaxDeferred, Decimal::new(50, 2)),
                (AccountType::Roth, Decimal::new(20, 2)),
                (AccountType::TaxableBrokerage, Decimal::new(30, 2)),
            ]),
            order: vec![
                AccountType::TaxDeferred,
                AccountType::Roth,
                AccountType::TaxableBrokerage,
                AccountType::Cash,
            ],
        }
    }
}

impl AllocationPolicy for ProportionalPolicy {
    fn name(&self) -> &'static str {
        "proportional"
    }

    fn opening_weights(&self) -> BucketValues {
        self.opening
    }

    fn contribution_weights(
        &self,
        stream: ContributionStream,
    ) -> BucketValues {
        match stream {
            ContributionStream::Retirement => self.retirement_contributions,
            ContributionStream::Savings => self.savings_contributions,
        }
    }

    fn withdrawal_weights(&self) -> BucketValues {
        self.withdrawals
    }

    fn withdrawal_order(&self) -> Vec<AccountType> {
        self.order.clone()
    }
}

/// Draws taxable money first, then tax-deferred, then Roth, then cash.
///
/// Contributions follow the default proportional weights.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxSequencedPolicy {
    contributions: ProportionalPolicy,
}

impl AllocationPolicy for TaxSequencedPolicy {
    fn name(&self) -> &'static str {
        "tax-sequenced"
    }

    fn opening_weights(&self) -> BucketValues {
        self.contributions.opening_weights()
    }

    fn contribution_weights(
        &self,
        stream: ContributionStream,
    ) -> BucketValues {
        self.contributions.contribution_weights(stream)
    }

    fn withdrawal_weights(&self) -> BucketValues {
        BucketValues::zero()
    }

    fn withdrawal_order(&self) -> Vec<AccountType> {
        vec![
            AccountType::TaxableBrokerage,
            AccountType::TaxDeferred,
            AccountType::Roth,
            AccountType::Cash,
        ]
    }
}

/// Looks up a built-in policy by its [`AllocationPolicy::name`].
pub fn policy_by_name(name: &str) -> Option<Arc<dyn AllocationPolicy>> {
    match name {
        "proportional" => Some(Arc::new(ProportionalPolicy::default())),
        "tax-sequenced" => Some(Arc::new(TaxSequencedPolicy::default())),
        _ => None,
    }
}

/// Applies an [`AllocationPolicy`] to balances.
#[derive(Debug, Clone, Copy)]
pub struct AccountLedger<'a> {
    policy: &'a dyn AllocationPolicy,
}

impl<'a> AccountLedger<'a> {
    pub fn new(policy: &'a dyn AllocationPolicy) -> Self {
        Self { policy }
    }

    /// Spreads a starting net worth across the buckets.
    ///
    /// A negative net worth opens every bucket at zero.
    pub fn open(
        &self,
        initial_net_worth: Decimal,
    ) -> BucketValues {
        split_by_weights(
            truncate_to_cents(non_negative(initial_net_worth)),
            &self.policy.opening_weights(),
        )
    }

    /// Splits one year's contribution and withdrawal totals across buckets.
    ///
    /// Amounts are expected in whole cents. A negative total is treated as
    /// zero.
    pub fn apply(
        &self,
        contribution: Contribution,
        withdrawal_total: Decimal,
        balances: &BucketValues,
    ) -> LedgerDeltas {
        let retirement = split_by_weights(
            non_negative(contribution.retirement),
            &self
                .policy
                .contribution_weights(ContributionStream::Retirement),
        );
        let savings = split_by_weights(
            non_negative(contribution.savings),
            &self.policy.contribution_weights(ContributionStream::Savings),
        );

        let mut contributions = BucketValues::zero();
        for account in AccountType::ALL {
            contributions[account] = retirement[account] + savings[account];
        }

        LedgerDeltas {
            contributions,
            withdrawals: self.draw(withdrawal_total, balances),
        }
    }

    fn draw(
        &self,
        requested: Decimal,
        balances: &BucketValues,
    ) -> BucketValues {
        let available = non_negative_total(balances);
        let target = non_negative(requested).min(available);
        let mut draws = BucketValues::zero();
        if target.is_zero() {
            return draws;
        }

        // Proportional pass; a bucket never gives more than it holds.
        let weights = self.policy.withdrawal_weights();
        let total_weight = positive_weight_total(&weights);
        if total_weight > Decimal::ZERO {
            for account in AccountType::ALL {
                let weight = weights[account];
                if weight <= Decimal::ZERO {
                    continue;
                }
                let share = truncate_to_cents(target * weight / total_weight);
                draws[account] = share.min(non_negative(balances[account]));
            }
        }

        // Backfill pass in policy order, then any bucket the order skipped.
        let mut remaining = target - draws.total();
        let mut order = self.policy.withdrawal_order();
        for account in AccountType::ALL {
            if !order.contains(&account) {
                order.push(account);
            }
        }
        for account in order {
            if remaining <= Decimal::ZERO {
                break;
            }
            let headroom = non_negative(balances[account]) - draws[account];
            let take = remaining.min(headroom);
            if take > Decimal::ZERO {
                draws[account] += take;
                remaining -= take;
            }
        }

        draws
    }
}

fn non_negative_total(values: &BucketValues) -> Decimal {
    values.iter().map(|(_, value)| non_negative(value)).sum()
}

fn positive_weight_total(weights: &BucketValues) -> Decimal {
    weights
        .iter()
        .map(|(_, weight)| non_negative(weight))
        .sum()
}

/// Splits `amount` by `weights`, truncating each share to cents and giving
/// the remainder to the last weighted bucket so the parts sum exactly.
///
/// With no positive weight the whole amount lands in cash.
fn split_by_weights(
    amount: Decimal,
    weights: &BucketValues,
) -> BucketValues {
    let mut parts = BucketValues::zero();
    if amount <= Decimal::ZERO {
        return parts;
    }

    let weighted: Vec<AccountType> = AccountType::ALL
        .into_iter()
        .filter(|account| weights[*account] > Decimal::ZERO)
        .collect();
    let Some((last, rest)) = weighted.split_last() else {
        parts[AccountType::Cash] = amount;
        return parts;
    };

    let total_weight = positive_weight_total(weights);
    let mut allocated = Decimal::ZERO;
    for account in rest {
        let share = truncate_to_cents(amount * weights[*account] / total_weight);
        parts[*account] = share;
        allocated += share;
    }
    parts[*last] = amount - allocated;

    parts
}
