use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::{KvStore, StoreFactory};
use crate::error::WebSqlError;

lazy_static! {
    static ref UNSAFE_PATH_CHARS: Regex =
        Regex::new(r"[^A-Za-z0-9_.-]").expect("static path pattern compiles");
}

/// Map an arbitrary namespace or key to a single safe path component.
///
/// Every byte outside `[A-Za-z0-9_.-]` (including `%` itself) becomes `%XX`, so distinct
/// names never share a component. The reserved names get a bare `%` prefix, which the
/// escaping never produces.
fn path_component(raw: &str) -> String {
    let escaped = UNSAFE_PATH_CHARS.replace_all(raw, |caps: &Captures<'_>| {
        caps[0].bytes().map(|byte| format!("%{byte:02X}")).collect::<String>()
    });
    match escaped.as_ref() {
        "" | "." | ".." => format!("%{escaped}"),
        _ => escaped.into_owned(),
    }
}

/// Blob store backed by one directory; each key is one file.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// # Errors
    /// Returns `WebSqlError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, WebSqlError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.blob", path_component(key)))
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, WebSqlError> {
        match tokio::fs::read(self.key_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(WebSqlError::Store(format!("read {key}: {err}"))),
        }
    }

    async fn set(&self, key: &str, bytes: Vec<u8>) -> Result<(), WebSqlError> {
        let dir = self.dir.clone();
        let path = self.key_path(key);
        tokio::task::spawn_blocking(move || -> Result<(), WebSqlError> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path)
                .map_err(|err| WebSqlError::Store(format!("persist {}: {err}", path.display())))?;
            Ok(())
        })
        .await
        .map_err(|err| WebSqlError::Store(format!("write task failed: {err}")))?
    }
}

/// Creates one [`FileStore`] per namespace under a root directory.
#[derive(Debug, Clone)]
pub struct FileStoreFactory {
    root: PathBuf,
}

impl FileStoreFactory {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl StoreFactory for FileStoreFactory {
    fn create(&self, namespace: &str) -> Result<Arc<dyn KvStore>, WebSqlError> {
        let store = FileStore::open(self.root.join(path_component(namespace)))?;
        Ok(Arc::new(store))
    }
}
