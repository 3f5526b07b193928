use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use websql_bridge::prelude::*;

fn manual() -> RegistryOptions {
    RegistryOptions {
        persistence: PersistencePolicy::Manual,
        ..RegistryOptions::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn same_name_shares_one_instance() -> Result<(), WebSqlError> {
    let factory = MemoryStoreFactory::new();
    let registry = DatabaseRegistry::new(Arc::new(factory.clone()), manual());

    let mut opens = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        opens.push(tokio::spawn(async move {
            registry.open("shared", "1.0", "shared db", 0, None)
        }));
    }
    let mut handles = Vec::new();
    for open in opens {
        handles.push(open.await.expect("open task panicked")?);
    }

    assert_eq!(factory.stores_created(), 1);
    assert_eq!(registry.initialization_count(), 1);
    assert_eq!(registry.names(), vec!["shared".to_string()]);

    handles[0]
        .transaction(
            |tx| {
                tx.execute_sql("CREATE TABLE s (x INTEGER)", vec![]);
                Ok(())
            },
            None,
            None,
        )
        .await?;
    // another handle sees the table created through the first one
    handles[7]
        .transaction(
            |tx| {
                tx.execute_sql("INSERT INTO s (x) VALUES (1)", vec![]);
                Ok(())
            },
            None,
            None,
        )
        .await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn distinct_names_are_isolated() -> Result<(), WebSqlError> {
    let factory = MemoryStoreFactory::new();
    let registry = DatabaseRegistry::new(Arc::new(factory.clone()), manual());
    let a = registry.open("a", "1", "", 0, None)?;
    let b = registry.open("b", "1", "", 0, None)?;

    a.transaction(
        |tx| {
            tx.execute_sql("CREATE TABLE only_a (x INTEGER)", vec![]);
            Ok(())
        },
        None,
        None,
    )
    .await?;
    let probe = b
        .transaction(
            |tx| {
                tx.execute_sql("SELECT * FROM only_a", vec![]);
                Ok(())
            },
            None,
            None,
        )
        .await;
    assert!(probe.is_err());
    assert_eq!(factory.stores_created(), 2);
    assert_eq!(registry.initialization_count(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn ready_callback_fires_once_for_the_creator() -> Result<(), WebSqlError> {
    let registry = DatabaseRegistry::in_memory(manual());
    let calls = Arc::new(AtomicUsize::new(0));
    let (ready_tx, ready_rx) = oneshot::channel();

    let counter = Arc::clone(&calls);
    let first = registry.open(
        "ready",
        "1",
        "",
        0,
        Some(Box::new(move |db: Database| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = ready_tx.send(db.name().to_owned());
        })),
    )?;
    let counter = Arc::clone(&calls);
    let second = registry.open(
        "ready",
        "2",
        "ignored",
        99,
        Some(Box::new(move |_: Database| {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
    )?;

    let name = tokio::time::timeout(Duration::from_secs(5), ready_rx)
        .await
        .expect("ready callback in time")
        .expect("ready sender kept");
    assert_eq!(name, "ready");
    second.wait_ready().await?;
    assert!(first.is_ready());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // the second open got the existing instance and its metadata
    assert_eq!(second.version(), "1");
    assert_eq!(second.display_name(), "");
    assert_eq!(second.estimated_size(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn get_returns_opened_databases() -> Result<(), WebSqlError> {
    let registry = DatabaseRegistry::in_memory(manual());
    assert!(registry.get("missing").is_none());
    let db = registry.open("known", "1", "Known", 2048, None)?;
    let again = registry.get("known").expect("opened above");
    assert_eq!(again.name(), db.name());
    assert_eq!(again.display_name(), "Known");
    assert_eq!(again.estimated_size(), 2048);
    assert_eq!(again.persistence_policy(), PersistencePolicy::Manual);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn corrupt_image_fails_initialization() -> Result<(), WebSqlError> {
    let factory = MemoryStoreFactory::new();
    factory.insert_blob("broken_sqlite", "database", vec![0x42; 4096]);
    let registry = DatabaseRegistry::new(Arc::new(factory), manual());
    let db = registry.open("broken", "1", "", 0, None)?;

    let errors = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&errors);
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        db.transaction(
            |tx| {
                tx.execute_sql("SELECT 1", vec![]);
                Ok(())
            },
            Some(Box::new(move |_: &WebSqlError| {
                seen.fetch_add(1, Ordering::SeqCst);
            })),
            None,
        ),
    )
    .await
    .expect("transaction settles instead of hanging");

    assert!(matches!(result, Err(WebSqlError::Initialization { ref name, .. }) if name == "broken"));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert!(!db.is_ready());
    // the failure is permanent
    assert!(db.wait_ready().await.is_err());
    assert!(db.flush().await.is_err());
    Ok(())
}

/// Store that cannot be read.
struct UnreadableStore;

#[async_trait]
impl KvStore for UnreadableStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, WebSqlError> {
        Err(WebSqlError::Store("backend offline".into()))
    }

    async fn set(&self, _key: &str, _bytes: Vec<u8>) -> Result<(), WebSqlError> {
        Ok(())
    }
}

impl StoreFactory for UnreadableStore {
    fn create(&self, _namespace: &str) -> Result<Arc<dyn KvStore>, WebSqlError> {
        Ok(Arc::new(UnreadableStore))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn store_read_error_fails_initialization() -> Result<(), WebSqlError> {
    let registry = DatabaseRegistry::new(Arc::new(UnreadableStore), manual());
    let ready_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ready_calls);
    let db = registry.open(
        "offline",
        "1",
        "",
        0,
        Some(Box::new(move |_: Database| {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
    )?;

    let waited = tokio::time::timeout(Duration::from_secs(5), db.wait_ready())
        .await
        .expect("initialization settles");
    assert!(matches!(
        waited,
        Err(WebSqlError::Initialization { ref name, ref reason })
            if name == "offline" && reason.contains("backend offline")
    ));

    let result = db
        .transaction(
            |tx| {
                tx.execute_sql("SELECT 1", vec![]);
                Ok(())
            },
            None,
            None,
        )
        .await;
    assert!(matches!(result, Err(WebSqlError::Initialization { .. })));
    assert!(!db.is_ready());
    assert_eq!(ready_calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_image_opens_empty_database() -> Result<(), WebSqlError> {
    let factory = MemoryStoreFactory::new();
    factory.insert_blob("blank_sqlite", "database", Vec::new());
    let registry = DatabaseRegistry::new(Arc::new(factory), manual());
    let db = registry.open("blank", "1", "", 0, None)?;
    db.wait_ready().await?;
    db.transaction(
        |tx| {
            tx.execute_sql("CREATE TABLE fresh (x INTEGER)", vec![]);
            Ok(())
        },
        None,
        None,
    )
    .await?;
    Ok(())
}

#[test]
fn open_outside_runtime_is_rejected() {
    let registry = DatabaseRegistry::in_memory(manual());
    let err = registry.open("no_rt", "1", "", 0, None).unwrap_err();
    assert!(matches!(err, WebSqlError::ConfigError(_)));
    assert!(registry.get("no_rt").is_none());
}
