//! Table, engine and database settings.
//!
//! Every config deserializes with defaults for the optional fields, so a
//! database can be described in a file by its name alone.

#[cfg(feature = "redb")]
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::{MemoryEngine, StorageEngine};

fn default_version() -> u32 {
    1
}

fn default_cache_query() -> bool {
    true
}

/// Identity and schema settings for one record table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Logical database the table belongs to.
    pub database_name: String,
    /// Physical table name inside the engine.
    pub table_name: String,
    /// Schema version. Raising it drops and recreates the table.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Whether the table's shared builder reuses one compiled query.
    #[serde(default = "default_cache_query")]
    pub cache_query: bool,
}

impl TableConfig {
    #[must_use]
    pub fn new(database_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            table_name: table_name.into(),
            version: default_version(),
            cache_query: default_cache_query(),
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_cache_query(mut self, cache_query: bool) -> Self {
        self.cache_query = cache_query;
        self
    }
}

/// Which storage engine backs a database.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EngineConfig {
    /// Volatile in-process tables.
    #[default]
    Memory,
    /// Single-file durable storage.
    #[cfg(feature = "redb")]
    Redb { path: PathBuf },
}

impl EngineConfig {
    /// Opens the configured engine.
    ///
    /// # Errors
    ///
    /// Returns an error if a file-backed engine cannot open its file.
    pub fn open(&self) -> anyhow::Result<Arc<dyn StorageEngine>> {
        match self {
            Self::Memory => Ok(Arc::new(MemoryEngine::new())),
            #[cfg(feature = "redb")]
            Self::Redb { path } => Ok(Arc::new(crate::storage::RedbEngine::open(path)?)),
        }
    }
}

/// Settings for a whole database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    /// Schema version applied to every table of the database.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DatabaseConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            engine: EngineConfig::default(),
        }
    }

    /// Config for table `table_name` of this database.
    #[must_use]
    pub fn table(&self, table_name: impl Into<String>) -> TableConfig {
        TableConfig::new(self.name.clone(), table_name).with_version(self.version)
    }
}
