use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use websql_bridge::prelude::*;

fn registry(root: &TempDir) -> DatabaseRegistry {
    let options = RegistryOptions {
        persistence: PersistencePolicy::AfterCommit,
        ..RegistryOptions::default()
    };
    DatabaseRegistry::new(Arc::new(FileStoreFactory::new(root.path())), options)
}

#[tokio::test(flavor = "multi_thread")]
async fn file_backed_database_reopens() -> Result<(), WebSqlError> {
    let root = TempDir::new()?;

    {
        let db = registry(&root).open("notes", "1", "Notes", 0, None)?;
        db.transaction(
            |tx| {
                tx.execute_sql("CREATE TABLE notes (body TEXT)", vec![]);
                tx.execute_sql("INSERT INTO notes (body) VALUES (?1)", vec!["hello".into()]);
                Ok(())
            },
            None,
            None,
        )
        .await?;
    }

    let blob = root.path().join("notes_sqlite").join("database.blob");
    assert!(blob.exists(), "expected {}", blob.display());

    let db = registry(&root).open("notes", "1", "Notes", 0, None)?;
    let bodies: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&bodies);
    db.transaction(
        move |tx| {
            tx.execute_sql("SELECT body FROM notes", vec![])
                .on_success(move |_, rs| {
                    let mut sink = sink.lock().unwrap();
                    for row in rs.rows() {
                        if let Some(body) = row.get("body").and_then(RowValues::as_text) {
                            sink.push(body.to_owned());
                        }
                    }
                    Ok(())
                });
            Ok(())
        },
        None,
        None,
    )
    .await?;
    assert_eq!(*bodies.lock().unwrap(), vec!["hello".to_string()]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn hostile_names_stay_inside_the_root() -> Result<(), WebSqlError> {
    let root = TempDir::new()?;
    let db = registry(&root).open("../escape", "1", "", 0, None)?;
    db.transaction(
        |tx| {
            tx.execute_sql("CREATE TABLE x (y INTEGER)", vec![]);
            Ok(())
        },
        None,
        None,
    )
    .await?;

    let parent = root.path().parent().expect("tempdir has a parent");
    assert!(!parent.join("escape_sqlite").exists());
    let entries: Vec<_> = std::fs::read_dir(root.path())?.collect();
    assert_eq!(entries.len(), 1);
    Ok(())
}

async fn table_exists(db: &Database, table: &str) -> Result<bool, WebSqlError> {
    let sql = format!("SELECT * FROM {table}");
    let result = db
        .read_transaction(
            move |tx| {
                tx.execute_sql(sql, vec![]);
                Ok(())
            },
            None,
            None,
        )
        .await;
    match result {
        Ok(()) => Ok(true),
        Err(err) if err.is_statement_error() => Ok(false),
        Err(err) => Err(err),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn names_differing_only_in_escaped_characters_keep_separate_images() -> Result<(), WebSqlError> {
    let root = TempDir::new()?;

    {
        let registry = registry(&root);
        for (name, table) in [("a b", "only_in_a"), ("a_b", "only_in_b")] {
            let db = registry.open(name, "1", "", 0, None)?;
            let sql = format!("CREATE TABLE {table} (x INTEGER)");
            db.transaction(
                move |tx| {
                    tx.execute_sql(sql, vec![]);
                    Ok(())
                },
                None,
                None,
            )
            .await?;
        }
    }
    assert_eq!(std::fs::read_dir(root.path())?.count(), 2);

    let registry = registry(&root);
    let spaced = registry.open("a b", "1", "", 0, None)?;
    assert!(table_exists(&spaced, "only_in_a").await?);
    assert!(!table_exists(&spaced, "only_in_b").await?);

    let underscored = registry.open("a_b", "1", "", 0, None)?;
    assert!(table_exists(&underscored, "only_in_b").await?);
    assert!(!table_exists(&underscored, "only_in_a").await?);
    Ok(())
}
