mod args;
mod logging;
mod session;

use std::sync::Arc;

use clap::Parser;

use websql_bridge::{DatabaseRegistry, FileStoreFactory, WebSqlError};

use crate::args::{Args, ShellConfig};
use crate::logging::LogWriter;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = ShellConfig::from_args(args);
    let writer = LogWriter::new(config.log.clone(), config.verbose).unwrap_or_else(|err| {
        eprintln!("failed to open log file: {err}");
        std::process::exit(1);
    });

    let max_level = writer.max_level();
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_max_level(max_level)
        .init();

    let config_json = serde_json::to_string_pretty(&config).unwrap_or_else(|_| "{}".to_string());
    tracing::info!("config: {}", config_json);

    if let Err(err) = run(&config).await {
        tracing::error!(error = %err, "shell failed");
        std::process::exit(1);
    }
}

async fn run(config: &ShellConfig) -> Result<(), WebSqlError> {
    let registry = DatabaseRegistry::new(
        Arc::new(FileStoreFactory::new(&config.data_dir)),
        config.registry_options()?,
    );
    let db = registry.open(&config.database, &config.db_version, &config.database, 0, None)?;
    db.wait_ready().await?;

    let outcome = if config.statements.is_empty() {
        session::run(&db).await
    } else {
        session::run_batch(&db, &config.statements).await
    };
    // the final write happens regardless of the policy
    db.flush().await?;
    outcome
}
