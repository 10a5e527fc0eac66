pub mod calculations;
pub mod db;
pub mod emitter;
pub mod models;
pub mod orchestrator;

pub use calculations::{
    AllocationPolicy, MilestoneDeriver, ProjectionCalculator, ProjectionSummary,
    ProportionalPolicy, TaxSequencedPolicy, policy_by_name,
};
pub use db::{
    DbConfig, InMemoryRepository, InMemoryRepositoryFactory, PlanRepository, RepositoryError,
    RepositoryFactory, RepositoryRegistry,
};
pub use emitter::{EmittedRecords, SamplingPolicy, SnapshotEmitter};
pub use models::*;
pub use orchestrator::{GenerationError, GenerationReport, PlanOrchestrator};
