mod loader;

pub use loader::{DEFAULT_SAMPLE_EVERY, DemoPlanLoader, DemoPlanRecord, SeedError};
