//! Databases: named groups of record tables sharing one storage engine.
//!
//! A [`Database`] is assembled once by a [`DatabaseBuilder`] and is
//! immutable afterwards. Tables are looked up by record type.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tristore_core::{Codec, MetadataResolver, MsgPackCodec, Record, StoreError, StoreResult};

use crate::config::{DatabaseConfig, TableConfig};
use crate::storage::StorageEngine;
use crate::table::RecordTable;

/// Name used when neither the builder nor a declared table names the database.
pub const DEFAULT_DATABASE_NAME: &str = "main";

type AnyTable = Arc<dyn Any + Send + Sync>;

type OpenTable =
    Box<dyn FnOnce(Arc<dyn StorageEngine>, TableConfig) -> StoreResult<AnyTable> + Send>;

struct PendingTable {
    type_id: TypeId,
    table_name: String,
    /// Database name the record type was declared with, if any.
    declared_database: Option<String>,
    open: OpenTable,
}

/// Collects table registrations, then opens them all in [`build`](Self::build).
pub struct DatabaseBuilder {
    engine: Arc<dyn StorageEngine>,
    name: Option<String>,
    version: u32,
    cache_query: bool,
    pending: Vec<PendingTable>,
}

impl DatabaseBuilder {
    #[must_use]
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            engine,
            name: None,
            version: 1,
            cache_query: true,
            pending: Vec::new(),
        }
    }

    /// Opens the engine `config` describes and takes its name and version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the engine cannot be opened.
    pub fn from_config(config: &DatabaseConfig) -> StoreResult<Self> {
        let engine = config.engine.open()?;
        Ok(Self::new(engine)
            .name(config.name.clone())
            .version(config.version))
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Schema version for every table of the database.
    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Whether each table's shared builder caches its compiled query.
    #[must_use]
    pub fn cache_query(mut self, enabled: bool) -> Self {
        self.cache_query = enabled;
        self
    }

    /// Stores records of type `T` in table `table_name`, `MsgPack`-encoded.
    ///
    /// Adding a type that is already present does nothing.
    #[must_use]
    pub fn add_table<T>(self, table_name: impl Into<String>) -> Self
    where
        T: Record,
        MsgPackCodec: Codec<T>,
    {
        self.add_table_with_codec::<T, MsgPackCodec>(table_name, MsgPackCodec)
    }

    /// Stores records of type `T` in table `table_name`, encoded with `codec`.
    ///
    /// Adding a type that is already present does nothing.
    #[must_use]
    pub fn add_table_with_codec<T, C>(self, table_name: impl Into<String>, codec: C) -> Self
    where
        T: Record,
        C: Codec<T>,
    {
        self.push::<T, C>(table_name.into(), None, codec)
    }

    /// Stores records of type `T` where `resolver` says they belong.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AnnotationMissing`] if `T` was never declared.
    /// - [`StoreError::AnnotationConflict`] if `T` has conflicting declarations.
    pub fn add_declared_table<T>(self, resolver: &MetadataResolver) -> StoreResult<Self>
    where
        T: Record,
        MsgPackCodec: Codec<T>,
    {
        let meta = resolver.resolve::<T>()?;
        Ok(self.push::<T, MsgPackCodec>(meta.table_name, Some(meta.database_name), MsgPackCodec))
    }

    fn push<T, C>(
        mut self,
        table_name: String,
        declared_database: Option<String>,
        codec: C,
    ) -> Self
    where
        T: Record,
        C: Codec<T>,
    {
        let type_id = TypeId::of::<T>();
        if self.pending.iter().any(|table| table.type_id == type_id) {
            tracing::debug!(
                record_type = type_name::<T>(),
                table = %table_name,
                "record type already added, skipping"
            );
            return self;
        }

        let open: OpenTable = Box::new(move |engine, config| {
            let table = RecordTable::<T, C>::open_with_codec(engine, &config, codec)?;
            Ok(Arc::new(table) as AnyTable)
        });
        self.pending.push(PendingTable {
            type_id,
            table_name,
            declared_database,
            open,
        });
        self
    }

    /// Opens every added table and returns the finished database.
    ///
    /// All database names are checked before any table is opened.
    ///
    /// # Errors
    ///
    /// - [`StoreError::SchemaConflict`] if a declared table names another
    ///   database than the one being built.
    /// - Any error from [`RecordTable::ensure_schema`].
    pub fn build(self) -> StoreResult<Database> {
        let name = self
            .name
            .or_else(|| {
                self.pending
                    .iter()
                    .find_map(|table| table.declared_database.clone())
            })
            .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());

        for table in &self.pending {
            if let Some(found) = &table.declared_database {
                if *found != name {
                    return Err(StoreError::SchemaConflict {
                        expected: name,
                        found: found.clone(),
                        table: table.table_name.clone(),
                    });
                }
            }
        }

        let mut tables = HashMap::with_capacity(self.pending.len());
        for table in self.pending {
            let config = TableConfig::new(name.clone(), table.table_name)
                .with_version(self.version)
                .with_cache_query(self.cache_query);
            let opened = (table.open)(Arc::clone(&self.engine), config)?;
            tables.insert(table.type_id, opened);
        }

        tracing::info!(
            database = %name,
            version = self.version,
            tables = tables.len(),
            "database ready"
        );
        Ok(Database {
            name,
            version: self.version,
            engine: self.engine,
            tables,
        })
    }
}

/// A named set of record tables on one storage engine.
pub struct Database {
    name: String,
    version: u32,
    engine: Arc<dyn StorageEngine>,
    tables: HashMap<TypeId, AnyTable>,
}

impl Database {
    #[must_use]
    pub fn builder(engine: Arc<dyn StorageEngine>) -> DatabaseBuilder {
        DatabaseBuilder::new(engine)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// The table storing records of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableNotRegistered`] if no table was added for `T`.
    pub fn table<T>(&self) -> StoreResult<Arc<RecordTable<T>>>
    where
        T: Record,
        MsgPackCodec: Codec<T>,
    {
        self.table_with_codec::<T, MsgPackCodec>()
    }

    /// The table storing records of type `T` with codec `C`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableNotRegistered`] if no table was added for
    /// `T`, or it was added with another codec.
    pub fn table_with_codec<T, C>(&self) -> StoreResult<Arc<RecordTable<T, C>>>
    where
        T: Record,
        C: Codec<T>,
    {
        self.tables
            .get(&TypeId::of::<T>())
            .and_then(|table| Arc::clone(table).downcast::<RecordTable<T, C>>().ok())
            .ok_or_else(|| StoreError::TableNotRegistered {
                type_name: type_name::<T>(),
            })
    }

    pub(crate) fn tables(&self) -> impl Iterator<Item = (TypeId, &AnyTable)> {
        self.tables.iter().map(|(type_id, table)| (*type_id, table))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("tables", &self.tables.len())
            .finish_non_exhaustive()
    }
}
