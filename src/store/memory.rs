use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{KvStore, StoreFactory};
use crate::error::WebSqlError;

type Blobs = HashMap<(String, String), Vec<u8>>;

/// Process-local blob store.
///
/// Stores created by one [`MemoryStoreFactory`] share a backing map, so a second registry
/// built from the same factory sees what the first one flushed.
#[derive(Clone)]
pub struct MemoryStore {
    namespace: String,
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    blobs: Mutex<Blobs>,
    writes: AtomicUsize,
    created: AtomicUsize,
}

impl Shared {
    fn blobs(&self) -> MutexGuard<'_, Blobs> {
        match self.blobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WebSqlError> {
        Ok(self
            .shared
            .blobs()
            .get(&(self.namespace.clone(), key.to_owned()))
            .cloned())
    }

    async fn set(&self, key: &str, bytes: Vec<u8>) -> Result<(), WebSqlError> {
        self.shared
            .blobs()
            .insert((self.namespace.clone(), key.to_owned()), bytes);
        self.shared.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory for [`MemoryStore`] handles; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStoreFactory {
    shared: Arc<Shared>,
}

impl MemoryStoreFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total successful `set` calls across every namespace.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.shared.writes.load(Ordering::SeqCst)
    }

    /// Number of store handles handed out.
    #[must_use]
    pub fn stores_created(&self) -> usize {
        self.shared.created.load(Ordering::SeqCst)
    }

    /// Snapshot of a blob, for inspection.
    #[must_use]
    pub fn blob(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        self.shared
            .blobs()
            .get(&(namespace.to_owned(), key.to_owned()))
            .cloned()
    }

    /// Seed a blob directly, bypassing any database.
    pub fn insert_blob(&self, namespace: &str, key: &str, bytes: Vec<u8>) {
        self.shared
            .blobs()
            .insert((namespace.to_owned(), key.to_owned()), bytes);
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn create(&self, namespace: &str) -> Result<Arc<dyn KvStore>, WebSqlError> {
        self.shared.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryStore {
            namespace: namespace.to_owned(),
            shared: Arc::clone(&self.shared),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn namespaces_are_isolated() -> Result<(), WebSqlError> {
        let factory = MemoryStoreFactory::new();
        let a = factory.create("a")?;
        let b = factory.create("b")?;
        a.set("database", vec![1, 2, 3]).await?;
        assert_eq!(a.get("database").await?, Some(vec![1, 2, 3]));
        assert_eq!(b.get("database").await?, None);
        assert_eq!(factory.write_count(), 1);
        assert_eq!(factory.stores_created(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn set_overwrites() -> Result<(), WebSqlError> {
        let factory = MemoryStoreFactory::new();
        let store = factory.create("a")?;
        store.set("k", vec![1]).await?;
        store.set("k", vec![2]).await?;
        assert_eq!(factory.blob("a", "k"), Some(vec![2]));
        Ok(())
    }
}
