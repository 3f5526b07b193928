mod channel;
mod dispatcher;
mod engine;
mod manager;

pub use engine::SqliteEngine;
