pub mod result_set;

pub use result_set::{EngineMetadata, StatementKind, adapt};
