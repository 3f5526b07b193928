use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebSqlError {
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Database '{name}' failed to initialize: {reason}")]
    Initialization { name: String, reason: String },

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl WebSqlError {
    /// True when the error came out of the SQL engine itself (prepare, bind or step).
    #[must_use]
    pub fn is_statement_error(&self) -> bool {
        matches!(
            self,
            WebSqlError::SqliteError(_)
                | WebSqlError::ParameterError(_)
                | WebSqlError::ExecutionError(_)
        )
    }
}

impl From<serde_json::Error> for WebSqlError {
    fn from(err: serde_json::Error) -> Self {
        WebSqlError::ConfigError(format!("invalid options JSON: {err}"))
    }
}
