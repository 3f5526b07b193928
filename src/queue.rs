use std::collections::VecDeque;
use std::fmt;

use tracing::debug;

use crate::error::WebSqlError;
use crate::results::ResultSet;
use crate::transaction::SqlTransaction;
use crate::types::RowValues;

/// Called with the statement's result set. Returning `Err` fails the whole transaction.
pub type StatementCallback =
    Box<dyn FnOnce(&mut SqlTransaction, &ResultSet) -> Result<(), WebSqlError> + Send>;

/// Called when the statement failed. Returning `Ok(())` marks the failure handled and the
/// drain moves on; returning `Err` fails the whole transaction.
pub type StatementErrorCallback =
    Box<dyn FnOnce(&mut SqlTransaction, &WebSqlError) -> Result<(), WebSqlError> + Send>;

/// One buffered statement.
pub struct StatementRequest {
    sql: String,
    args: Vec<RowValues>,
    on_success: Option<StatementCallback>,
    on_error: Option<StatementErrorCallback>,
}

impl StatementRequest {
    fn new(sql: String, args: Vec<RowValues>) -> Self {
        Self {
            sql,
            args,
            on_success: None,
            on_error: None,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn args(&self) -> &[RowValues] {
        &self.args
    }

    pub fn on_success<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(&mut SqlTransaction, &ResultSet) -> Result<(), WebSqlError> + Send + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(&mut SqlTransaction, &WebSqlError) -> Result<(), WebSqlError> + Send + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for StatementRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementRequest")
            .field("sql", &self.sql)
            .field("args", &self.args)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Ordered buffer of statements waiting to run. Enqueue order is execution order.
#[derive(Debug, Default)]
pub struct StatementQueue {
    pending: VecDeque<StatementRequest>,
}

impl StatementQueue {
    /// Append a request. Nothing runs here and the SQL is not validated until execution.
    pub fn enqueue(&mut self, sql: String, args: Vec<RowValues>) -> &mut StatementRequest {
        self.pending.push_back(StatementRequest::new(sql, args));
        let last = self.pending.len() - 1;
        &mut self.pending[last]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn pop_front(&mut self) -> Option<StatementRequest> {
        self.pending.pop_front()
    }

    fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

/// What a completed drain did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Statements that ran successfully.
    pub executed: usize,
    /// Statements that failed and whose error callback handled the failure.
    pub handled_failures: usize,
}

/// Run every queued statement of `tx`, one at a time, in enqueue order.
///
/// Callbacks may enqueue more statements; those run after everything already queued. A failed
/// statement without an error callback stops the drain and the rest of the queue is dropped
/// unexecuted.
///
/// # Errors
/// Returns the first unhandled statement error, or the error returned by a callback.
pub(crate) async fn drain(tx: &mut SqlTransaction) -> Result<DrainSummary, WebSqlError> {
    let mut summary = DrainSummary::default();
    while let Some(request) = tx.queue_mut().pop_front() {
        let StatementRequest {
            sql,
            args,
            on_success,
            on_error,
        } = request;

        match tx.engine().execute(&sql, &args).await {
            Ok(result_set) => {
                summary.executed += 1;
                if let Some(callback) = on_success {
                    callback(tx, &result_set)?;
                }
            }
            Err(err) => {
                let Some(callback) = on_error else {
                    let skipped = tx.queue_mut().clear();
                    debug!(
                        database = %tx.database(),
                        %sql,
                        error = %err,
                        skipped,
                        "unhandled statement error, aborting queue"
                    );
                    return Err(err);
                };
                debug!(database = %tx.database(), %sql, error = %err, "statement error handled by callback");
                callback(tx, &err)?;
                summary.handled_failures += 1;
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_preserves_order_and_returns_request() {
        let mut queue = StatementQueue::default();
        queue.enqueue("SELECT 1".into(), vec![]);
        queue
            .enqueue("SELECT ?1".into(), vec![RowValues::Int(2)])
            .on_success(|_, _| Ok(()));
        assert_eq!(queue.len(), 2);
        let first = queue.pop_front().expect("first");
        assert_eq!(first.sql(), "SELECT 1");
        assert!(first.on_success.is_none());
        let second = queue.pop_front().expect("second");
        assert_eq!(second.args(), &[RowValues::Int(2)]);
        assert!(second.on_success.is_some());
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_reports_dropped_count() {
        let mut queue = StatementQueue::default();
        queue.enqueue("SELECT 1".into(), vec![]);
        queue.enqueue("SELECT 2".into(), vec![]);
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
