use std::sync::mpsc::{self, Sender};
use std::thread;

use tokio::sync::oneshot;

use crate::error::WebSqlError;
use crate::results::ResultSet;
use crate::sqlite::params::Params;

use super::channel::Command;
use super::dispatcher::{open_engine, run_sqlite_worker};

pub(super) struct SqliteWorker {
    sender: Sender<Command>,
    label: String,
}

impl SqliteWorker {
    /// Spawn the worker thread and wait until its database is open (and restored).
    pub(super) async fn start(label: &str, initial: Option<Vec<u8>>) -> Result<Self, WebSqlError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), WebSqlError>>();
        thread::Builder::new()
            .name(format!("sqlite-engine-{label}"))
            .spawn(move || match open_engine(initial.as_deref()) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        run_sqlite_worker(&conn, &receiver);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .map_err(|err| {
                WebSqlError::ConnectionError(format!("failed to spawn SQLite worker thread: {err}"))
            })?;

        ready_rx
            .await
            .map_err(|_| connection_error("SQLite worker exited during startup"))??;

        Ok(Self {
            sender,
            label: label.to_owned(),
        })
    }

    pub(super) fn label(&self) -> &str {
        &self.label
    }

    fn send_command(&self, command: Command) -> Result<(), WebSqlError> {
        self.sender
            .send(command)
            .map_err(|_| connection_error("SQLite worker closed"))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, WebSqlError>>) -> Command,
        drop_message: &'static str,
    ) -> Result<T, WebSqlError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(build(tx))?;
        rx.await.map_err(|_| connection_error(drop_message))?
    }

    pub(super) async fn execute(&self, sql: String, params: Params) -> Result<ResultSet, WebSqlError> {
        self.request(
            |respond_to| Command::Execute {
                sql,
                params,
                respond_to,
            },
            "SQLite worker dropped while executing statement",
        )
        .await
    }

    pub(super) async fn export(&self) -> Result<Vec<u8>, WebSqlError> {
        self.request(
            |respond_to| Command::Export { respond_to },
            "SQLite worker dropped while exporting",
        )
        .await
    }
}

impl Drop for SqliteWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

fn connection_error(message: &str) -> WebSqlError {
    WebSqlError::ConnectionError(message.into())
}
