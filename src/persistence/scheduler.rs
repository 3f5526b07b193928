use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::policy::PersistencePolicy;
use crate::error::WebSqlError;
use crate::sqlite::SqliteEngine;
use crate::store::KvStore;

/// Counters describing what the scheduler has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub completed: u64,
    pub failed: u64,
    /// Periodic ticks dropped because a flush was already running.
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Flushed { bytes: usize },
    Skipped,
}

/// Everything a flush touches. Shared with the background tasks.
struct FlushTarget {
    name: String,
    key: String,
    engine: SqliteEngine,
    store: Arc<dyn KvStore>,
    // held for the duration of a flush; no two flushes of one instance overlap
    in_flight: tokio::sync::Mutex<()>,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl FlushTarget {
    /// Flush, waiting for an in-flight flush when `wait` is set and skipping otherwise.
    async fn flush(&self, wait: bool) -> Result<FlushOutcome, WebSqlError> {
        let _guard = if wait {
            self.in_flight.lock().await
        } else if let Ok(guard) = self.in_flight.try_lock() {
            guard
        } else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(database = %self.name, "flush already in flight, skipping tick");
            return Ok(FlushOutcome::Skipped);
        };

        match self.write_snapshot().await {
            Ok(bytes) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                debug!(database = %self.name, bytes, "flushed database");
                Ok(FlushOutcome::Flushed { bytes })
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(database = %self.name, error = %err, "flush failed");
                Err(err)
            }
        }
    }

    async fn write_snapshot(&self) -> Result<usize, WebSqlError> {
        let bytes = self
            .engine
            .export_state()
            .await
            .map_err(|err| WebSqlError::Persistence(format!("export failed: {err}")))?;
        let len = bytes.len();
        self.store
            .set(&self.key, bytes)
            .await
            .map_err(|err| WebSqlError::Persistence(format!("store write failed: {err}")))?;
        Ok(len)
    }
}

/// Decides when a database's engine state is exported and written to its store.
///
/// Background work (the periodic ticker, a pending debounced flush) stops when the scheduler
/// is dropped.
pub struct PersistenceScheduler {
    target: Arc<FlushTarget>,
    policy: PersistencePolicy,
    background: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl PersistenceScheduler {
    /// Create the scheduler and start its periodic ticker when the policy asks for one.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(
        name: &str,
        key: &str,
        engine: SqliteEngine,
        store: Arc<dyn KvStore>,
        policy: PersistencePolicy,
    ) -> Self {
        let target = Arc::new(FlushTarget {
            name: name.to_owned(),
            key: key.to_owned(),
            engine,
            store,
            in_flight: tokio::sync::Mutex::new(()),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        });
        let shutdown = CancellationToken::new();

        let ticker = match (policy, policy.timer()) {
            (PersistencePolicy::Periodic { .. }, Some(interval)) => Some(spawn_periodic(
                Arc::clone(&target),
                interval,
                shutdown.clone(),
            )),
            _ => None,
        };
        debug!(database = %name, ?policy, "persistence scheduler started");

        Self {
            target,
            policy,
            background: Mutex::new(ticker),
            shutdown,
        }
    }

    #[must_use]
    pub fn policy(&self) -> PersistencePolicy {
        self.policy
    }

    /// Tell the scheduler that a transaction committed.
    ///
    /// With [`PersistencePolicy::AfterCommit`] this flushes and waits for the write. A debounced
    /// policy (re)arms its timer. Periodic and manual policies ignore the signal. Flush failures
    /// are logged and counted, never returned.
    pub async fn schedule_flush(&self) {
        match self.policy {
            PersistencePolicy::AfterCommit => {
                let _ = self.target.flush(true).await;
            }
            PersistencePolicy::Debounced { .. } => {
                if let Some(delay) = self.policy.timer() {
                    self.rearm(delay);
                }
            }
            PersistencePolicy::Periodic { .. } | PersistencePolicy::Manual => {}
        }
    }

    /// Flush now, waiting behind any flush already in flight.
    ///
    /// # Errors
    /// Returns [`WebSqlError::Persistence`] if exporting or writing fails.
    pub async fn flush_now(&self) -> Result<FlushOutcome, WebSqlError> {
        self.target.flush(true).await
    }

    #[must_use]
    pub fn stats(&self) -> FlushStats {
        FlushStats {
            completed: self.target.completed.load(Ordering::Relaxed),
            failed: self.target.failed.load(Ordering::Relaxed),
            skipped: self.target.skipped.load(Ordering::Relaxed),
        }
    }

    fn rearm(&self, delay: Duration) {
        let mut pending = match self.background.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        let target = Arc::clone(&self.target);
        let shutdown = self.shutdown.clone();
        *pending = Some(tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    // detached so a later rearm cannot abort a write mid-way
                    tokio::spawn(async move {
                        let _ = target.flush(true).await;
                    });
                }
            }
        }));
    }
}

impl Drop for PersistenceScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
        let pending = match self.background.get_mut() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    }
}

fn spawn_periodic(
    target: Arc<FlushTarget>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let target = Arc::clone(&target);
                    tokio::spawn(async move {
                        let _ = target.flush(false).await;
                    });
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStoreFactory, StoreFactory};

    async fn scheduler(
        factory: &MemoryStoreFactory,
        policy: PersistencePolicy,
    ) -> Result<PersistenceScheduler, WebSqlError> {
        let engine = SqliteEngine::open_empty("sched").await?;
        engine
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
            .await?;
        let store = factory.create("sched_sqlite")?;
        Ok(PersistenceScheduler::start(
            "sched", "database", engine, store, policy,
        ))
    }

    #[tokio::test]
    async fn manual_flush_writes_snapshot() -> Result<(), WebSqlError> {
        let factory = MemoryStoreFactory::new();
        let scheduler = scheduler(&factory, PersistencePolicy::Manual).await?;

        scheduler.schedule_flush().await;
        assert_eq!(factory.write_count(), 0);

        let outcome = scheduler.flush_now().await?;
        assert!(matches!(outcome, FlushOutcome::Flushed { bytes } if bytes > 0));
        assert_eq!(factory.write_count(), 1);
        assert!(factory.blob("sched_sqlite", "database").is_some());
        assert_eq!(scheduler.stats().completed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn after_commit_flushes_before_returning() -> Result<(), WebSqlError> {
        let factory = MemoryStoreFactory::new();
        let scheduler = scheduler(&factory, PersistencePolicy::AfterCommit).await?;
        scheduler.schedule_flush().await;
        scheduler.schedule_flush().await;
        assert_eq!(factory.write_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn debounce_collapses_signals() -> Result<(), WebSqlError> {
        let factory = MemoryStoreFactory::new();
        let scheduler = scheduler(
            &factory,
            PersistencePolicy::debounced(Duration::from_millis(100)),
        )
        .await?;
        for _ in 0..5 {
            scheduler.schedule_flush().await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(factory.write_count(), 0);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(factory.write_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn periodic_ticks_flush() -> Result<(), WebSqlError> {
        let factory = MemoryStoreFactory::new();
        let _scheduler = scheduler(
            &factory,
            PersistencePolicy::periodic(Duration::from_millis(50)),
        )
        .await?;
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(factory.write_count() >= 2);
        Ok(())
    }

    #[tokio::test]
    async fn dropping_stops_the_ticker() -> Result<(), WebSqlError> {
        let factory = MemoryStoreFactory::new();
        let scheduler = scheduler(
            &factory,
            PersistencePolicy::periodic(Duration::from_millis(30)),
        )
        .await?;
        drop(scheduler);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(factory.write_count(), 0);
        Ok(())
    }
}
