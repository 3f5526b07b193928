// Durable blob stores - one namespace per database name
//
// - memory: process-local store, shared across handles of one factory
// - file: one directory per namespace, atomic whole-file writes

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WebSqlError;

pub mod file;
pub mod memory;

pub use file::{FileStore, FileStoreFactory};
pub use memory::{MemoryStore, MemoryStoreFactory};

/// Asynchronous key to blob store, scoped to one database namespace.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the blob stored under `key`.
    ///
    /// # Errors
    /// Returns [`WebSqlError::Store`] (or `Io`) if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WebSqlError>;

    /// Replace the blob stored under `key`. Readers see either the old or the new blob.
    ///
    /// # Errors
    /// Returns [`WebSqlError::Store`] (or `Io`) if the backend cannot be written.
    async fn set(&self, key: &str, bytes: Vec<u8>) -> Result<(), WebSqlError>;
}

/// Creates the store handle for a namespace. Called once per database instance.
pub trait StoreFactory: Send + Sync {
    /// # Errors
    /// Returns [`WebSqlError`] if the namespace cannot be prepared.
    fn create(&self, namespace: &str) -> Result<Arc<dyn KvStore>, WebSqlError>;
}
