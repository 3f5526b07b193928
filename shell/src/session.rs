use serde_json::{Value as JsonValue, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use websql_bridge::{Database, FlushOutcome, WebSqlError};

/// What one input line asks for.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command<'a> {
    Statement(&'a str),
    Flush,
    Stats,
    Version,
    Migrate { from: &'a str, to: &'a str },
    Quit,
    Skip,
    Unknown(&'a str),
}

pub(crate) fn parse_line(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("--") {
        return Command::Skip;
    }
    let Some(meta) = trimmed.strip_prefix('.') else {
        return Command::Statement(trimmed);
    };
    let mut words = meta.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some("flush"), None, _) => Command::Flush,
        (Some("stats"), None, _) => Command::Stats,
        (Some("version"), None, _) => Command::Version,
        (Some("migrate"), Some(from), Some(to)) => Command::Migrate { from, to },
        (Some("quit" | "exit"), None, _) => Command::Quit,
        _ => Command::Unknown(trimmed),
    }
}

/// Read commands from stdin until EOF or `.quit`, printing one JSON line per command.
pub(crate) async fn run(db: &Database) -> Result<(), WebSqlError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let reply = match parse_line(&line) {
            Command::Skip => continue,
            Command::Quit => break,
            Command::Statement(sql) => execute(db, sql).await,
            Command::Flush => flush(db).await,
            Command::Stats => db
                .flush_stats()
                .await
                .map(|stats| json!({"completed": stats.completed, "failed": stats.failed, "skipped": stats.skipped})),
            Command::Version => Ok(json!({"version": db.version()})),
            Command::Migrate { from, to } => db
                .change_version(from, to, |_| Ok(()), None, None)
                .await
                .map(|()| json!({"version": db.version()})),
            Command::Unknown(text) => Err(WebSqlError::Other(format!("unknown command {text}"))),
        };
        let out = match reply {
            Ok(result) => json!({"ok": true, "result": result}),
            Err(err) => json!({"ok": false, "error": err.to_string()}),
        };
        stdout.write_all(format!("{out}\n").as_bytes()).await?;
        stdout.flush().await?;
    }
    info!(database = %db.name(), "input closed");
    Ok(())
}

/// Run `statements` in one transaction and print each result set as a JSON line.
pub(crate) async fn run_batch(db: &Database, statements: &[String]) -> Result<(), WebSqlError> {
    let (results, outcome) = collect_batch(db, statements).await;

    // statements that succeeded before a failure still get their line
    let mut stdout = tokio::io::stdout();
    for result in results {
        stdout.write_all(format!("{result}\n").as_bytes()).await?;
    }
    stdout.flush().await?;
    outcome
}

/// Result sets of the statements that ran, in order, plus the transaction outcome.
async fn collect_batch(
    db: &Database,
    statements: &[String],
) -> (Vec<JsonValue>, Result<(), WebSqlError>) {
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    let batch = statements.to_vec();
    let outcome = db
        .transaction(
            move |tx| {
                for sql in batch {
                    let results = result_tx.clone();
                    tx.execute_sql(sql, vec![]).on_success(move |_, rs| {
                        let _ = results.send(rs.to_json());
                        Ok(())
                    });
                }
                Ok(())
            },
            None,
            None,
        )
        .await;

    let mut results = Vec::new();
    while let Ok(result) = result_rx.try_recv() {
        results.push(result);
    }
    (results, outcome)
}

async fn execute(db: &Database, sql: &str) -> Result<JsonValue, WebSqlError> {
    let (result_tx, result_rx) = oneshot::channel();
    let sql = sql.to_owned();
    debug!(%sql, "running statement");
    db.transaction(
        move |tx| {
            tx.execute_sql(sql, vec![]).on_success(move |_, rs| {
                let _ = result_tx.send(rs.to_json());
                Ok(())
            });
            Ok(())
        },
        None,
        None,
    )
    .await?;
    result_rx
        .await
        .map_err(|_| WebSqlError::Other("statement produced no result".into()))
}

async fn flush(db: &Database) -> Result<JsonValue, WebSqlError> {
    Ok(match db.flush().await? {
        FlushOutcome::Flushed { bytes } => json!({"flushed": bytes}),
        FlushOutcome::Skipped => json!({"flushed": null}),
    })
}
