use tracing::debug;

use crate::error::WebSqlError;
use crate::queue::{StatementQueue, StatementRequest, drain};
use crate::registry::DatabaseInstance;
use crate::sqlite::SqliteEngine;
use crate::types::RowValues;

/// Called once the transaction's statements all ran (and, under an after-commit policy, were
/// flushed).
pub type TransactionSuccessCallback = Box<dyn FnOnce() + Send>;

/// Called with the error that failed the transaction.
pub type TransactionErrorCallback = Box<dyn FnOnce(&WebSqlError) + Send>;

/// Runs after a clean drain while the transaction still holds its instance. An error here
/// fails the transaction.
pub(crate) type CommitHook = Box<dyn FnOnce() -> Result<(), WebSqlError> + Send>;

/// The context handed to a transaction body and to statement callbacks.
///
/// Lives for one transaction only and is bound to the engine of the database it was
/// started on.
pub struct SqlTransaction {
    database: String,
    engine: SqliteEngine,
    queue: StatementQueue,
}

impl SqlTransaction {
    pub(crate) fn new(database: &str, engine: SqliteEngine) -> Self {
        Self {
            database: database.to_owned(),
            engine,
            queue: StatementQueue::default(),
        }
    }

    /// Queue a statement. It runs after the body returns, in the order queued.
    ///
    /// ```rust,no_run
    /// # use websql_bridge::prelude::*;
    /// # fn body(tx: &mut SqlTransaction) -> Result<(), WebSqlError> {
    /// tx.execute_sql("INSERT INTO t (label) VALUES (?1)", vec!["a".into()])
    ///     .on_success(|_tx, rs| {
    ///         println!("inserted row {:?}", rs.insert_id());
    ///         Ok(())
    ///     });
    /// # Ok(())
    /// # }
    /// ```
    pub fn execute_sql(
        &mut self,
        sql: impl Into<String>,
        args: Vec<RowValues>,
    ) -> &mut StatementRequest {
        self.queue.enqueue(sql.into(), args)
    }

    /// Name of the database this transaction runs against.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Statements queued and not yet executed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn engine(&self) -> &SqliteEngine {
        &self.engine
    }

    pub(crate) fn queue_mut(&mut self) -> &mut StatementQueue {
        &mut self.queue
    }
}

/// Run one transaction against `instance`.
///
/// Waits for readiness, takes the instance's transaction slot, runs `body` to collect
/// statements, drains them, runs `commit_hook`, and signals the persistence scheduler.
/// Exactly one of `on_success` / `on_error` is called.
pub(crate) async fn run_transaction<B>(
    instance: &DatabaseInstance,
    body: B,
    commit_hook: Option<CommitHook>,
    on_error: Option<TransactionErrorCallback>,
    on_success: Option<TransactionSuccessCallback>,
) -> Result<(), WebSqlError>
where
    B: FnOnce(&mut SqlTransaction) -> Result<(), WebSqlError> + Send,
{
    let outcome = async {
        let live = instance.wait_ready().await?;
        let _slot = instance.lock_transactions().await;

        let mut tx = SqlTransaction::new(instance.name(), live.engine.clone());
        body(&mut tx)?;
        let summary = drain(&mut tx).await?;
        if let Some(hook) = commit_hook {
            hook()?;
        }
        live.scheduler.schedule_flush().await;
        Ok::<_, WebSqlError>(summary)
    }
    .await;

    match outcome {
        Ok(summary) => {
            debug!(
                database = %instance.name(),
                executed = summary.executed,
                handled_failures = summary.handled_failures,
                "transaction completed"
            );
            if let Some(callback) = on_success {
                callback();
            }
            Ok(())
        }
        Err(err) => {
            debug!(database = %instance.name(), error = %err, "transaction failed");
            if let Some(callback) = on_error {
                callback(&err);
            }
            Err(err)
        }
    }
}
