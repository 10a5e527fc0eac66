mod account_type;
mod milestone;
mod plan;
mod plan_parameters;
mod projection;
mod snapshot;

pub use account_type::{AccountType, GrowthClass};
pub use milestone::{Milestone, MilestoneType, NewMilestone, PersonalMilestone};
pub use plan::{NewPlan, Plan, PlanAggregate};
pub use plan_parameters::{
    InvalidParameters, LiabilityParameters, MAX_AMOUNT, MAX_PLAN_AGE, PlanParameters,
    PlanParametersInput, ProjectionAssumptions, validate_plan_parameters,
};
pub use projection::{AccountState, AnnualProjection, Phase};
pub use snapshot::{AccountStateRecord, NewAccountState, NewSnapshot, Snapshot};
