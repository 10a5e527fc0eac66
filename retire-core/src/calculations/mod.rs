//! Projection calculations.
//!
//! Everything in this module is synchronous and free of I/O: the account
//! ledger, the year-by-year projection fold and the milestone catalog.

pub mod common;
pub mod ledger;
pub mod milestones;
pub mod projection;

pub use ledger::{
    AccountLedger, AllocationPolicy, BucketValues, Contribution, ContributionStream,
    LedgerDeltas, ProportionalPolicy, TaxSequencedPolicy, policy_by_name,
};
pub use milestones::{MilestoneDeriver, STANDARD_MILESTONES, StandardMilestone};
pub use projection::{ProjectionCalculator, ProjectionState, ProjectionSummary};
