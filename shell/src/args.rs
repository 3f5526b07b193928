use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use websql_bridge::{PersistenceMode, PersistencePolicy, RegistryOptions, WebSqlError};

#[derive(Parser, Debug)]
#[command(author, version, about = "Line-oriented shell over a persisted websql-bridge database")]
pub(crate) struct Args {
    /// Directory holding one sub-directory per database.
    #[arg(long, default_value = ".websql")]
    pub(crate) data_dir: PathBuf,
    #[arg(long, default_value = "main")]
    pub(crate) database: String,
    /// Version to open the database with.
    #[arg(long = "db-version", default_value = "1.0")]
    pub(crate) db_version: String,
    #[arg(long, value_enum, default_value = "after-commit")]
    pub(crate) persistence: PersistenceMode,
    /// Interval (periodic) or delay (debounced), e.g. `500ms` or `2s`.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) delay: Option<Duration>,
    /// Also write logs to this file, down to DEBUG whatever `--verbose` says.
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    /// Show DEBUG events on stderr.
    #[arg(long, short)]
    pub(crate) verbose: bool,
    /// Statements to run in one transaction. Without any, commands are read from stdin.
    pub(crate) statements: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ShellConfig {
    pub(crate) data_dir: PathBuf,
    pub(crate) database: String,
    pub(crate) db_version: String,
    pub(crate) persistence: PersistencePolicy,
    pub(crate) log: Option<PathBuf>,
    pub(crate) verbose: bool,
    pub(crate) statements: Vec<String>,
}

impl ShellConfig {
    pub(crate) fn from_args(args: Args) -> Self {
        ShellConfig {
            data_dir: args.data_dir,
            database: args.database,
            db_version: args.db_version,
            persistence: PersistencePolicy::from_mode(args.persistence, args.delay),
            log: args.log,
            verbose: args.verbose,
            statements: args.statements,
        }
    }

    pub(crate) fn registry_options(&self) -> Result<RegistryOptions, WebSqlError> {
        RegistryOptions::builder()
            .persistence(self.persistence)
            .finish()
    }
}
