use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tracing::{debug, error};

use crate::config::RegistryOptions;
use crate::error::WebSqlError;
use crate::persistence::{FlushOutcome, FlushStats, PersistencePolicy, PersistenceScheduler};
use crate::readiness::ReadinessGate;
use crate::sqlite::SqliteEngine;
use crate::store::{KvStore, MemoryStoreFactory, StoreFactory};
use crate::transaction::{
    CommitHook, SqlTransaction, TransactionErrorCallback, TransactionSuccessCallback,
    run_transaction,
};

/// Called once, with the new handle, when a freshly created database finished initializing.
pub type ReadyCallback = Box<dyn FnOnce(Database) + Send>;

/// The parts of an instance that exist only after initialization succeeded.
pub(crate) struct LiveDatabase {
    pub(crate) engine: SqliteEngine,
    pub(crate) scheduler: PersistenceScheduler,
}

/// One logical database: identity, its store, and the readiness of its engine.
pub(crate) struct DatabaseInstance {
    name: String,
    version: Mutex<String>,
    display_name: String,
    estimated_size: u64,
    policy: PersistencePolicy,
    store: Arc<dyn KvStore>,
    gate: ReadinessGate<Arc<LiveDatabase>>,
    // serializes transactions against the single engine
    transactions: tokio::sync::Mutex<()>,
}

impl DatabaseInstance {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) async fn wait_ready(&self) -> Result<Arc<LiveDatabase>, WebSqlError> {
        self.gate.wait().await
    }

    pub(crate) async fn lock_transactions(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.transactions.lock().await
    }

    fn version_guard(&self) -> MutexGuard<'_, String> {
        match self.version.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Move the version from `old` to `new`, failing if it is no longer `old`.
    fn swap_version(&self, old: &str, new: &str) -> Result<(), WebSqlError> {
        let mut version = self.version_guard();
        if *version != old {
            return Err(WebSqlError::VersionMismatch {
                expected: old.to_owned(),
                found: version.clone(),
            });
        }
        new.clone_into(&mut version);
        Ok(())
    }
}

/// Explicit name-to-database registry.
///
/// At most one database exists per name for the registry's lifetime; every `open` of a name
/// returns a handle to the same instance. Cloning the registry shares it.
#[derive(Clone)]
pub struct DatabaseRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    store_factory: Arc<dyn StoreFactory>,
    options: RegistryOptions,
    instances: Mutex<HashMap<String, Arc<DatabaseInstance>>>,
    initializations: AtomicUsize,
}

impl DatabaseRegistry {
    #[must_use]
    pub fn new(store_factory: Arc<dyn StoreFactory>, options: RegistryOptions) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store_factory,
                options,
                instances: Mutex::new(HashMap::new()),
                initializations: AtomicUsize::new(0),
            }),
        }
    }

    /// Registry over a fresh process-local store.
    #[must_use]
    pub fn in_memory(options: RegistryOptions) -> Self {
        Self::new(Arc::new(MemoryStoreFactory::new()), options)
    }

    #[must_use]
    pub fn options(&self) -> &RegistryOptions {
        &self.inner.options
    }

    fn instances(&self) -> MutexGuard<'_, HashMap<String, Arc<DatabaseInstance>>> {
        match self.inner.instances.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Open (or create) the database called `name`.
    ///
    /// Returns at once. The first open of a name creates its store and starts initialization
    /// in the background: the saved image is read from the store and restored into a new
    /// engine. Operations on the handle wait for that to finish, or fail if it failed.
    /// `on_ready` is only called for the open that created the database; later opens return
    /// the existing instance and ignore their `version` and metadata.
    ///
    /// # Errors
    /// Returns `WebSqlError::ConfigError` when called outside a tokio runtime, or the store
    /// factory's error if the namespace cannot be created.
    pub fn open(
        &self,
        name: &str,
        version: &str,
        display_name: &str,
        estimated_size: u64,
        on_ready: Option<ReadyCallback>,
    ) -> Result<Database, WebSqlError> {
        let runtime = Handle::try_current().map_err(|_| {
            WebSqlError::ConfigError("opening a database requires a tokio runtime".into())
        })?;

        let instance = {
            let mut instances = self.instances();
            if let Some(existing) = instances.get(name) {
                return Ok(Database {
                    instance: Arc::clone(existing),
                });
            }

            let options = &self.inner.options;
            let store = self
                .inner
                .store_factory
                .create(&options.namespace_for(name))?;
            let instance = Arc::new(DatabaseInstance {
                name: name.to_owned(),
                version: Mutex::new(version.to_owned()),
                display_name: display_name.to_owned(),
                estimated_size,
                policy: options.persistence,
                store,
                gate: ReadinessGate::new(name),
                transactions: tokio::sync::Mutex::new(()),
            });
            instances.insert(name.to_owned(), Arc::clone(&instance));
            instance
        };

        self.inner.initializations.fetch_add(1, Ordering::SeqCst);
        debug!(database = %name, version, "opening database");
        runtime.spawn(initialize(
            Arc::clone(&instance),
            self.inner.options.storage_key.clone(),
            on_ready,
        ));

        Ok(Database { instance })
    }

    /// Handle to an already opened database.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Database> {
        self.instances().get(name).map(|instance| Database {
            instance: Arc::clone(instance),
        })
    }

    /// Names of every database opened so far, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of initializations started; one per distinct name.
    #[must_use]
    pub fn initialization_count(&self) -> usize {
        self.inner.initializations.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for DatabaseRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseRegistry")
            .field("options", &self.inner.options)
            .field("databases", &self.names())
            .finish()
    }
}

/// Settles the gate as failed if initialization ends without settling it (e.g. a panic).
struct SettleOnExit(Arc<DatabaseInstance>);

impl Drop for SettleOnExit {
    fn drop(&mut self) {
        if !self.0.gate.is_settled() {
            self.0.gate.fail("initialization ended unexpectedly");
        }
    }
}

async fn initialize(
    instance: Arc<DatabaseInstance>,
    storage_key: String,
    on_ready: Option<ReadyCallback>,
) {
    let guard = SettleOnExit(Arc::clone(&instance));
    match load(&instance, &storage_key).await {
        Ok(live) => {
            instance.gate.complete(Arc::new(live));
            debug!(database = %instance.name, "database ready");
            drop(guard);
            if let Some(callback) = on_ready {
                callback(Database { instance });
            }
        }
        Err(err) => {
            error!(database = %instance.name, error = %err, "database initialization failed");
            instance.gate.fail(err.to_string());
        }
    }
}

async fn load(
    instance: &DatabaseInstance,
    storage_key: &str,
) -> Result<LiveDatabase, WebSqlError> {
    let saved = instance.store.get(storage_key).await?;
    let restoring = saved.as_ref().is_some_and(|bytes| !bytes.is_empty());
    debug!(database = %instance.name, restoring, "starting engine");

    let engine = SqliteEngine::start(&instance.name, saved).await?;
    let scheduler = PersistenceScheduler::start(
        &instance.name,
        storage_key,
        engine.clone(),
        Arc::clone(&instance.store),
        instance.policy,
    );
    Ok(LiveDatabase { engine, scheduler })
}

/// Connection handle to one opened database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    instance: Arc<DatabaseInstance>,
}

impl Database {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.instance.name
    }

    /// The currently recorded version.
    #[must_use]
    pub fn version(&self) -> String {
        self.instance.version_guard().clone()
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.instance.display_name
    }

    #[must_use]
    pub fn estimated_size(&self) -> u64 {
        self.instance.estimated_size
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.instance.gate.is_ready()
    }

    /// Wait until initialization finished.
    ///
    /// # Errors
    /// Returns `WebSqlError::Initialization` if it failed.
    pub async fn wait_ready(&self) -> Result<(), WebSqlError> {
        self.instance.wait_ready().await.map(|_| ())
    }

    /// Run a read/write transaction.
    ///
    /// `body` queues statements through [`SqlTransaction::execute_sql`]; they run after it
    /// returns. Exactly one of `on_success` / `on_error` is called, and the same outcome is
    /// returned.
    ///
    /// # Errors
    /// Returns the error that failed the transaction: an initialization failure, an error from
    /// `body`, an unhandled statement error, or an error returned by a statement callback.
    pub async fn transaction<B>(
        &self,
        body: B,
        on_error: Option<TransactionErrorCallback>,
        on_success: Option<TransactionSuccessCallback>,
    ) -> Result<(), WebSqlError>
    where
        B: FnOnce(&mut SqlTransaction) -> Result<(), WebSqlError> + Send,
    {
        run_transaction(&self.instance, body, None, on_error, on_success).await
    }

    /// Same as [`Database::transaction`]; the engine has no separate read-only mode.
    ///
    /// # Errors
    /// See [`Database::transaction`].
    pub async fn read_transaction<B>(
        &self,
        body: B,
        on_error: Option<TransactionErrorCallback>,
        on_success: Option<TransactionSuccessCallback>,
    ) -> Result<(), WebSqlError>
    where
        B: FnOnce(&mut SqlTransaction) -> Result<(), WebSqlError> + Send,
    {
        self.transaction(body, on_error, on_success).await
    }

    /// Run `body` as a transaction and move the version from `old_version` to `new_version`.
    ///
    /// A mismatched `old_version` fails at once: `body` never runs and the version is left
    /// alone. The new version is recorded only if the whole transaction succeeds.
    ///
    /// # Errors
    /// Returns `WebSqlError::VersionMismatch`, or any error [`Database::transaction`] returns.
    pub async fn change_version<B>(
        &self,
        old_version: &str,
        new_version: &str,
        body: B,
        on_error: Option<TransactionErrorCallback>,
        on_success: Option<TransactionSuccessCallback>,
    ) -> Result<(), WebSqlError>
    where
        B: FnOnce(&mut SqlTransaction) -> Result<(), WebSqlError> + Send,
    {
        let current = self.version();
        if current != old_version {
            let err = WebSqlError::VersionMismatch {
                expected: old_version.to_owned(),
                found: current,
            };
            if let Some(callback) = on_error {
                callback(&err);
            }
            return Err(err);
        }

        let instance = Arc::clone(&self.instance);
        let (old_version, new_version) = (old_version.to_owned(), new_version.to_owned());
        let hook: CommitHook = Box::new(move || instance.swap_version(&old_version, &new_version));
        run_transaction(&self.instance, body, Some(hook), on_error, on_success).await
    }

    /// Write the engine's current state to the store now, waiting behind any flush in flight.
    ///
    /// # Errors
    /// Returns `WebSqlError::Initialization` if the database never became ready, or
    /// `WebSqlError::Persistence` if the flush failed.
    pub async fn flush(&self) -> Result<FlushOutcome, WebSqlError> {
        let live = self.instance.wait_ready().await?;
        live.scheduler.flush_now().await
    }

    /// Flush counters, once the database is ready.
    ///
    /// # Errors
    /// Returns `WebSqlError::Initialization` if the database never became ready.
    pub async fn flush_stats(&self) -> Result<FlushStats, WebSqlError> {
        let live = self.instance.wait_ready().await?;
        Ok(live.scheduler.stats())
    }

    /// Policy of the registry that created this database.
    #[must_use]
    pub fn persistence_policy(&self) -> PersistencePolicy {
        self.instance.policy
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.instance.name)
            .field("version", &self.version())
            .field("ready", &self.is_ready())
            .finish()
    }
}
