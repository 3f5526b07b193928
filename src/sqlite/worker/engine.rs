use std::fmt;
use std::sync::Arc;

use crate::error::WebSqlError;
use crate::results::ResultSet;
use crate::sqlite::params::Params;
use crate::types::RowValues;

use super::manager::SqliteWorker;

/// Engine handle: one in-memory `SQLite` database owned by a dedicated worker thread.
///
/// Every statement, metadata lookup and export runs on that thread, one command at a time, so
/// the database is never touched by two executions at once. Clones share the same worker; the
/// thread stops when the last clone is dropped.
#[derive(Clone)]
pub struct SqliteEngine {
    worker: Arc<SqliteWorker>,
}

impl SqliteEngine {
    /// Start an engine, restoring `initial` when it holds a non-empty database image.
    ///
    /// # Errors
    /// Returns [`WebSqlError`] if the worker thread cannot be spawned or the image cannot be
    /// restored.
    pub async fn start(label: &str, initial: Option<Vec<u8>>) -> Result<Self, WebSqlError> {
        let initial = initial.filter(|bytes| !bytes.is_empty());
        let worker = SqliteWorker::start(label, initial).await?;
        Ok(Self {
            worker: Arc::new(worker),
        })
    }

    /// Start an engine over an empty database.
    ///
    /// # Errors
    /// Returns [`WebSqlError`] if the worker thread cannot be spawned.
    pub async fn open_empty(label: &str) -> Result<Self, WebSqlError> {
        Self::start(label, None).await
    }

    /// Start an engine from a previously exported image.
    ///
    /// # Errors
    /// Returns [`WebSqlError`] if the bytes are not a valid database image.
    pub async fn from_bytes(label: &str, bytes: Vec<u8>) -> Result<Self, WebSqlError> {
        Self::start(label, Some(bytes)).await
    }

    /// Execute one statement and return its adapted [`ResultSet`].
    ///
    /// # Errors
    /// Returns [`WebSqlError`] if the statement fails to prepare, bind or step, or if the worker
    /// is gone.
    pub async fn execute(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, WebSqlError> {
        self.worker
            .execute(sql.to_owned(), Params::convert(args))
            .await
    }

    /// Serialize the engine's current full state.
    ///
    /// # Errors
    /// Returns [`WebSqlError`] if the backup fails or the worker is gone.
    pub async fn export_state(&self) -> Result<Vec<u8>, WebSqlError> {
        self.worker.export().await
    }
}

impl fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteEngine")
            .field("label", &self.worker.label())
            .finish()
    }
}
