use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value as JsonValue, json};

use super::row::{Row, index_columns};
use crate::types::RowValues;

/// The outcome of one executed statement.
///
/// Built only after the statement ran to completion and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    insert_id: Option<i64>,
    rows_affected: u64,
    rows: SqlResultSetRowList,
}

impl ResultSet {
    pub(crate) fn from_parts(
        rows: SqlResultSetRowList,
        insert_id: Option<i64>,
        rows_affected: u64,
    ) -> Self {
        Self {
            insert_id,
            rows_affected,
            rows,
        }
    }

    /// Row id of the last inserted row; only set for statements starting with `INSERT`.
    #[must_use]
    pub fn insert_id(&self) -> Option<i64> {
        self.insert_id
    }

    /// Rows changed by an `UPDATE` or `DELETE`; zero for every other statement.
    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    #[must_use]
    pub fn rows(&self) -> &SqlResultSetRowList {
        &self.rows
    }

    /// The result set in the object shape the legacy API exposes.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        json!({
            "insertId": self.insert_id,
            "rowsAffected": self.rows_affected,
            "rows": self.rows.iter().map(Row::to_json).collect::<Vec<_>>(),
        })
    }
}

/// Fixed-length, index-accessible list of rows.
#[derive(Debug, Clone, Default)]
pub struct SqlResultSetRowList {
    rows: Vec<Row>,
}

impl SqlResultSetRowList {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at `index`, or `None` past the end.
    #[must_use]
    pub fn item(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a SqlResultSetRowList {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Accumulates rows while a statement is stepped.
///
/// Column names and the lookup map are built once and shared by every collected row.
#[derive(Debug)]
pub struct RowCollector {
    column_names: Arc<Vec<String>>,
    column_index_cache: Arc<HashMap<String, usize>>,
    rows: Vec<Row>,
}

impl RowCollector {
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        let cache = Arc::new(index_columns(&column_names));
        Self {
            column_names: Arc::new(column_names),
            column_index_cache: cache,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.column_names.len()
    }

    /// Add a row to the collection
    pub fn add_row_values(&mut self, values: Vec<RowValues>) {
        self.rows.push(Row {
            column_names: Arc::clone(&self.column_names),
            values,
            column_index_cache: Arc::clone(&self.column_index_cache),
        });
    }

    #[must_use]
    pub fn finish(self) -> SqlResultSetRowList {
        SqlResultSetRowList { rows: self.rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collection_yields_empty_list() {
        let rows = RowCollector::new(vec!["a".into()]).finish();
        assert!(rows.is_empty());
        assert!(rows.item(0).is_none());
    }

    #[test]
    fn collected_rows_share_columns() {
        let mut collector = RowCollector::new(vec!["a".into(), "b".into()]);
        collector.add_row_values(vec![RowValues::Int(1), RowValues::Null]);
        collector.add_row_values(vec![RowValues::Int(2), RowValues::Text("x".into())]);
        let rows = collector.finish();
        assert_eq!(rows.len(), 2);
        let second = rows.item(1).expect("second row");
        assert_eq!(second.get("b"), Some(&RowValues::Text("x".into())));
        assert!(Arc::ptr_eq(
            &rows.item(0).expect("first row").column_names,
            &second.column_names
        ));

        let rs = ResultSet::from_parts(rows, None, 0);
        assert_eq!(rs.to_json()["rows"][0], json!({"a": 1, "b": null}));
    }
}
