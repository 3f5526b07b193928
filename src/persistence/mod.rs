// Persistence scheduling - when engine state is exported and written to the store
//
// - policy: the configurable flush strategy
// - scheduler: per-instance flush coordination and background tasks

pub mod policy;
pub mod scheduler;

pub use policy::{PersistenceMode, PersistencePolicy};
pub use scheduler::{FlushOutcome, FlushStats, PersistenceScheduler};
