use serde::{Deserialize, Serialize};

use crate::error::WebSqlError;
use crate::persistence::PersistencePolicy;

/// Store key the serialized database is written under.
pub const DEFAULT_STORAGE_KEY: &str = "database";
/// Appended to a database name to form its store namespace.
pub const DEFAULT_NAMESPACE_SUFFIX: &str = "_sqlite";

/// Options shared by every database a registry opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    pub persistence: PersistencePolicy,
    pub storage_key: String,
    pub namespace_suffix: String,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            persistence: PersistencePolicy::default(),
            storage_key: DEFAULT_STORAGE_KEY.to_owned(),
            namespace_suffix: DEFAULT_NAMESPACE_SUFFIX.to_owned(),
        }
    }
}

impl RegistryOptions {
    #[must_use]
    pub fn builder() -> RegistryOptionsBuilder {
        RegistryOptionsBuilder::default()
    }

    /// Parse options from JSON; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `WebSqlError::ConfigError` if the JSON is malformed or the options are invalid.
    pub fn from_json(json: &str) -> Result<Self, WebSqlError> {
        let options: RegistryOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// # Errors
    /// Returns `WebSqlError::ConfigError` if the storage key is empty.
    pub fn validate(&self) -> Result<(), WebSqlError> {
        if self.storage_key.is_empty() {
            return Err(WebSqlError::ConfigError("storage_key must not be empty".into()));
        }
        Ok(())
    }

    /// Store namespace for the database called `name`.
    #[must_use]
    pub fn namespace_for(&self, name: &str) -> String {
        format!("{name}{}", self.namespace_suffix)
    }
}

/// Fluent builder for [`RegistryOptions`].
#[derive(Debug, Clone, Default)]
pub struct RegistryOptionsBuilder {
    opts: RegistryOptions,
}

impl RegistryOptionsBuilder {
    #[must_use]
    pub fn persistence(mut self, policy: PersistencePolicy) -> Self {
        self.opts.persistence = policy;
        self
    }

    #[must_use]
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.opts.storage_key = key.into();
        self
    }

    #[must_use]
    pub fn namespace_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.opts.namespace_suffix = suffix.into();
        self
    }

    /// # Errors
    /// Returns `WebSqlError::ConfigError` if the options are invalid.
    pub fn finish(self) -> Result<RegistryOptions, WebSqlError> {
        self.opts.validate()?;
        Ok(self.opts)
    }
}
