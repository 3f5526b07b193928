use std::sync::mpsc::Receiver;

use rusqlite::Connection;
use tracing::debug;

use crate::error::WebSqlError;
use crate::sqlite::query::execute_statement;
use crate::sqlite::snapshot;

use super::channel::Command;

/// Open the engine's in-memory database, restoring `initial` into it when present.
pub(super) fn open_engine(initial: Option<&[u8]>) -> Result<Connection, WebSqlError> {
    let mut conn = Connection::open_in_memory()?;
    if let Some(bytes) = initial {
        snapshot::restore(&mut conn, bytes)?;
    }
    Ok(conn)
}

pub(super) fn run_sqlite_worker(conn: &Connection, receiver: &Receiver<Command>) {
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Shutdown => break,
            Command::Execute {
                sql,
                params,
                respond_to,
            } => {
                let _ = respond_to.send(execute_statement(conn, &sql, &params));
            }
            Command::Export { respond_to } => {
                let _ = respond_to.send(snapshot::export(conn));
            }
        }
    }
    debug!("sqlite engine worker exiting");
}
