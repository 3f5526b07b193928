use rusqlite::types::Value;

use crate::adapters::adapt;
use crate::error::WebSqlError;
use crate::results::{ResultSet, RowCollector, SqlResultSetRowList};
use crate::types::RowValues;

use super::params::Params;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `WebSqlError` if the value cannot be read.
pub fn sqlite_extract_value_sync(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<RowValues, WebSqlError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Prepare `sql`, bind `params` when there are any, and step it to completion.
///
/// The statement is released when this returns, on success and on error alike. With no
/// params nothing is bound, so placeholders read as NULL.
///
/// # Errors
/// Returns `WebSqlError` if preparing, binding or stepping fails.
pub fn collect_rows(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &Params,
) -> Result<SqlResultSetRowList, WebSqlError> {
    let mut stmt = conn.prepare(sql)?;
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let mut collector = RowCollector::new(column_names);
    let col_count = collector.column_count();

    let param_refs = params.as_refs();
    let mut rows = if params.is_empty() {
        stmt.raw_query()
    } else {
        stmt.query(&param_refs[..])?
    };

    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value_sync(row, i)?);
        }
        collector.add_row_values(row_values);
    }

    Ok(collector.finish())
}

/// Run one statement and adapt its outcome into a [`ResultSet`].
///
/// # Errors
/// Returns `WebSqlError` if the statement fails or a metadata query fails.
pub fn execute_statement(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &Params,
) -> Result<ResultSet, WebSqlError> {
    let rows = collect_rows(conn, sql, params)?;
    adapt(conn, rows, sql)
}
