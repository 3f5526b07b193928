//! Convenient imports for common functionality.
//!
//! `use websql_bridge::prelude::*;` brings in the registry, the transaction and callback types,
//! result types, and the bundled stores.

pub use crate::config::RegistryOptions;
pub use crate::error::WebSqlError;
pub use crate::persistence::{FlushOutcome, FlushStats, PersistenceMode, PersistencePolicy};
pub use crate::queue::StatementRequest;
pub use crate::registry::{Database, DatabaseRegistry, ReadyCallback};
pub use crate::results::{ResultSet, Row, SqlResultSetRowList};
pub use crate::store::{FileStoreFactory, KvStore, MemoryStoreFactory, StoreFactory};
pub use crate::transaction::{
    SqlTransaction, TransactionErrorCallback, TransactionSuccessCallback,
};
pub use crate::types::RowValues;
