// SQLite engine module - the in-process SQL engine behind every database instance
//
// - params: argument conversion between `RowValues` and SQLite values
// - query: statement execution and row collection
// - snapshot: full-state export and restore through the backup API
// - worker: the thread that owns the connection and its async handle

pub mod params;
pub mod query;
pub mod snapshot;
pub mod worker;

pub use params::Params;
pub use worker::SqliteEngine;
