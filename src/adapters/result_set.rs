use crate::error::WebSqlError;
use crate::results::{ResultSet, SqlResultSetRowList};

/// Which metadata a statement's result set carries.
///
/// Classification is a literal, case-insensitive prefix match on the SQL text. Leading
/// whitespace, comments or a `WITH ... INSERT` prefix are not recognized, so such statements
/// classify as [`StatementKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Starts with `INSERT`: the result carries the last insert row id.
    Insert,
    /// Starts with `UPDATE` or `DELETE`: the result carries the modified row count.
    Modify,
    Other,
}

impl StatementKind {
    #[must_use]
    pub fn classify(sql: &str) -> Self {
        if starts_with_keyword(sql, "INSERT") {
            StatementKind::Insert
        } else if starts_with_keyword(sql, "UPDATE") || starts_with_keyword(sql, "DELETE") {
            StatementKind::Modify
        } else {
            StatementKind::Other
        }
    }
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    sql.get(..keyword.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
}

/// Read-only engine queries the adapter needs after a statement ran.
pub trait EngineMetadata {
    /// Row id of the most recent successful insert on this engine.
    ///
    /// # Errors
    /// Returns [`WebSqlError`] if the engine cannot answer the query.
    fn last_insert_id(&self) -> Result<i64, WebSqlError>;

    /// Rows changed by the most recent `INSERT`, `UPDATE` or `DELETE`.
    ///
    /// # Errors
    /// Returns [`WebSqlError`] if the engine cannot answer the query.
    fn rows_modified(&self) -> Result<u64, WebSqlError>;
}

impl EngineMetadata for rusqlite::Connection {
    fn last_insert_id(&self) -> Result<i64, WebSqlError> {
        Ok(self.query_row("SELECT last_insert_rowid()", [], |row| row.get(0))?)
    }

    fn rows_modified(&self) -> Result<u64, WebSqlError> {
        let changes: i64 = self.query_row("SELECT changes()", [], |row| row.get(0))?;
        u64::try_from(changes)
            .map_err(|_| WebSqlError::ExecutionError(format!("negative change count {changes}")))
    }
}

/// Turn the rows of a completed statement into its [`ResultSet`].
///
/// An empty row list is valid (a `SELECT` matching nothing, or any DDL/DML).
///
/// # Errors
/// Returns [`WebSqlError`] if one of the metadata queries fails.
pub fn adapt<E: EngineMetadata + ?Sized>(
    engine: &E,
    rows: SqlResultSetRowList,
    sql: &str,
) -> Result<ResultSet, WebSqlError> {
    let (insert_id, rows_affected) = match StatementKind::classify(sql) {
        StatementKind::Insert => (Some(engine.last_insert_id()?), 0),
        StatementKind::Modify => (None, engine.rows_modified()?),
        StatementKind::Other => (None, 0),
    };
    Ok(ResultSet::from_parts(rows, insert_id, rows_affected))
}
