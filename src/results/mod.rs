// Result types handed to statement callbacks.
//
// - row: a single row with shared column names
// - result_set: the immutable per-statement outcome and its row list

pub mod result_set;
pub mod row;

pub use result_set::{ResultSet, RowCollector, SqlResultSetRowList};
pub use row::Row;
