//! Transactional SQL databases in the Web SQL shape, backed by an embedded `SQLite` engine and
//! persisted as whole-database images in an asynchronous key/blob store.
//!
//! Open a database through a [`DatabaseRegistry`], queue statements inside
//! [`Database::transaction`] bodies, and read results through [`ResultSet`].

pub mod adapters;
pub mod config;
pub mod error;
pub mod persistence;
pub mod prelude;
pub mod queue;
pub mod readiness;
pub mod registry;
pub mod results;
pub mod sqlite;
pub mod store;
pub mod transaction;
pub mod types;

pub use config::{RegistryOptions, RegistryOptionsBuilder};
pub use error::WebSqlError;
pub use persistence::{
    FlushOutcome, FlushStats, PersistenceMode, PersistencePolicy, PersistenceScheduler,
};
pub use queue::{StatementCallback, StatementErrorCallback, StatementRequest};
pub use registry::{Database, DatabaseRegistry, ReadyCallback};
pub use results::{ResultSet, Row, SqlResultSetRowList};
pub use sqlite::SqliteEngine;
pub use store::{FileStoreFactory, KvStore, MemoryStoreFactory, StoreFactory};
pub use transaction::{SqlTransaction, TransactionErrorCallback, TransactionSuccessCallback};
pub use types::RowValues;
