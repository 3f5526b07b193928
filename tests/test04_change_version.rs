use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use websql_bridge::prelude::*;

fn open(name: &str, version: &str) -> Result<Database, WebSqlError> {
    DatabaseRegistry::in_memory(RegistryOptions {
        persistence: PersistencePolicy::Manual,
        ..RegistryOptions::default()
    })
    .open(name, version, "", 0, None)
}

#[tokio::test(flavor = "multi_thread")]
async fn matching_version_migrates() -> Result<(), WebSqlError> {
    let db = open("migrate", "1.0")?;
    let succeeded = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&succeeded);

    db.change_version(
        "1.0",
        "2.0",
        |tx| {
            tx.execute_sql("CREATE TABLE m (x INTEGER)", vec![]);
            Ok(())
        },
        None,
        Some(Box::new(move || flag.store(true, Ordering::SeqCst))),
    )
    .await?;

    assert!(succeeded.load(Ordering::SeqCst));
    assert_eq!(db.version(), "2.0");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn mismatched_version_never_runs_body() -> Result<(), WebSqlError> {
    let db = open("mismatch", "1.0")?;
    let body_ran = Arc::new(AtomicBool::new(false));
    let errors = Arc::new(AtomicUsize::new(0));

    let ran = Arc::clone(&body_ran);
    let seen = Arc::clone(&errors);
    let result = db
        .change_version(
            "0.9",
            "2.0",
            move |_| {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            },
            Some(Box::new(move |err: &WebSqlError| {
                assert!(matches!(err, WebSqlError::VersionMismatch { .. }));
                seen.fetch_add(1, Ordering::SeqCst);
            })),
            None,
        )
        .await;

    assert!(matches!(
        result,
        Err(WebSqlError::VersionMismatch { ref expected, ref found }) if expected == "0.9" && found == "1.0"
    ));
    assert!(!body_ran.load(Ordering::SeqCst));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(db.version(), "1.0");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_migration_keeps_old_version() -> Result<(), WebSqlError> {
    let db = open("failed_migration", "1")?;
    let result = db
        .change_version(
            "1",
            "2",
            |tx| {
                tx.execute_sql("ALTER TABLE nothing ADD COLUMN y", vec![]);
                Ok(())
            },
            None,
            None,
        )
        .await;
    assert!(result.is_err());
    assert_eq!(db.version(), "1");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn version_is_shared_by_every_handle() -> Result<(), WebSqlError> {
    let registry = DatabaseRegistry::in_memory(RegistryOptions {
        persistence: PersistencePolicy::Manual,
        ..RegistryOptions::default()
    });
    let first = registry.open("shared_version", "1", "", 0, None)?;
    let second = registry.open("shared_version", "1", "", 0, None)?;

    first
        .change_version("1", "2", |_| Ok(()), None, None)
        .await?;
    assert_eq!(second.version(), "2");

    // the second handle must now migrate from "2"
    let stale = second.change_version("1", "3", |_| Ok(()), None, None).await;
    assert!(stale.is_err());
    second.change_version("2", "3", |_| Ok(()), None, None).await?;
    assert_eq!(first.version(), "3");
    Ok(())
}
