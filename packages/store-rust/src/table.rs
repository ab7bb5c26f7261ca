//! Typed record tables.
//!
//! A [`RecordTable`] owns one physical table of a [`StorageEngine`] and stores
//! records of a single type in it. Every row has the same four columns: the
//! record's id (primary key), its type, its encoded payload and its creation
//! time. The first, second and fourth are a queryable projection of the
//! record header; the payload carries the whole record.

use std::fmt;
use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use tristore_core::{
    Codec, Column, ConflictPolicy, Direction, MsgPackCodec, QuerySpec, Record, Row, Selection,
    StoreError, StoreResult,
};

use crate::config::TableConfig;
use crate::query::QueryBuilder;
use crate::storage::{Ddl, EngineError, InsertOutcome, StorageEngine};

/// Exclusive handle on a table's shared query builder.
///
/// The table's builder stays locked until the handle is dropped.
pub type SharedBuilder<T, C = MsgPackCodec> = ArcMutexGuard<RawMutex, QueryBuilder<T, C>>;

/// What a table and the queries built on it share.
pub(crate) struct TableCore<C> {
    pub(crate) engine: Arc<dyn StorageEngine>,
    pub(crate) database_name: String,
    pub(crate) table_name: String,
    pub(crate) codec: C,
}

/// Storage for records of type `T`, encoded with codec `C`.
pub struct RecordTable<T, C = MsgPackCodec> {
    core: Arc<TableCore<C>>,
    builder: Arc<Mutex<QueryBuilder<T, C>>>,
}

impl<T, C> RecordTable<T, C>
where
    T: Record,
    C: Codec<T> + Default,
{
    /// Opens the table described by `config`, creating or migrating it.
    ///
    /// # Errors
    ///
    /// See [`ensure_schema`](Self::ensure_schema).
    pub fn open(engine: Arc<dyn StorageEngine>, config: &TableConfig) -> StoreResult<Self> {
        Self::open_with_codec(engine, config, C::default())
    }
}

impl<T, C> RecordTable<T, C>
where
    T: Record,
    C: Codec<T>,
{
    /// Opens the table described by `config` with an explicit codec.
    ///
    /// # Errors
    ///
    /// See [`ensure_schema`](Self::ensure_schema).
    pub fn open_with_codec(
        engine: Arc<dyn StorageEngine>,
        config: &TableConfig,
        codec: C,
    ) -> StoreResult<Self> {
        let core = Arc::new(TableCore {
            engine,
            database_name: config.database_name.clone(),
            table_name: config.table_name.clone(),
            codec,
        });
        let builder = QueryBuilder::new(Arc::clone(&core), config.cache_query);
        let table = Self {
            core,
            builder: Arc::new(Mutex::new(builder)),
        };
        table.ensure_schema(config.version)?;
        Ok(table)
    }

    /// Makes sure the physical table exists at schema `version`.
    ///
    /// Calling it again with the stored version changes nothing. A higher
    /// version drops the table with all its rows and recreates it empty.
    ///
    /// # Errors
    ///
    /// - [`StoreError::SchemaDowngrade`] if `version` is below the stored one.
    /// - [`StoreError::Engine`] if the storage engine fails.
    pub fn ensure_schema(&self, version: u32) -> StoreResult<()> {
        let table = self.core.table_name.as_str();
        let engine = &self.core.engine;

        match engine.schema_version(table)? {
            Some(stored) if stored == version => {
                engine.execute(Ddl::CreateTable { table })?;
            }
            Some(stored) if stored > version => {
                return Err(StoreError::SchemaDowngrade {
                    table: table.to_string(),
                    stored,
                    requested: version,
                });
            }
            Some(stored) => {
                tracing::warn!(
                    table = %table,
                    from = stored,
                    to = version,
                    "schema version raised, dropping table"
                );
                engine.execute(Ddl::DropTable { table })?;
                engine.execute(Ddl::CreateTable { table })?;
                engine.set_schema_version(table, version)?;
            }
            None => {
                engine.execute(Ddl::CreateTable { table })?;
                engine.set_schema_version(table, version)?;
                tracing::info!(
                    database = %self.core.database_name,
                    table = %table,
                    version,
                    "created table"
                );
            }
        }
        Ok(())
    }

    /// Stores `record`, overwriting any row with the same id.
    ///
    /// # Errors
    ///
    /// See [`put_with`](Self::put_with).
    pub fn put(&self, record: &T) -> StoreResult<()> {
        self.put_with(record, ConflictPolicy::Replace).map(|_| ())
    }

    /// Stores `record`, resolving an id collision with `policy`.
    ///
    /// Returns what the engine did with the row. An ignored write is a
    /// success; a rejected one is an error.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidRecord`] if the record has no id.
    /// - [`StoreError::Encode`] if the codec cannot encode the record.
    /// - [`StoreError::ConstraintViolation`] if the id exists and `policy` is
    ///   `Abort`, `Fail` or `Rollback`.
    /// - [`StoreError::Engine`] if the storage engine fails.
    pub fn put_with(&self, record: &T, policy: ConflictPolicy) -> StoreResult<InsertOutcome> {
        let row = self.encode(record)?;
        let id = row.id.clone();
        let table = self.core.table_name.as_str();

        let outcome = self.core.engine.insert(table, row, policy)?;
        match outcome {
            InsertOutcome::Rejected => {
                tracing::warn!(table = %table, id = %id, policy = %policy, "write rejected");
                Err(StoreError::ConstraintViolation {
                    table: table.to_string(),
                    id,
                    policy,
                })
            }
            InsertOutcome::Ignored => {
                tracing::warn!(table = %table, id = %id, "write ignored, row already exists");
                Ok(outcome)
            }
            InsertOutcome::Inserted | InsertOutcome::Replaced => {
                tracing::debug!(table = %table, id = %id, ?outcome, "put");
                Ok(outcome)
            }
        }
    }

    /// Point lookup by id. A missing id is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Decode`] if the stored payload is corrupt.
    /// - [`StoreError::Engine`] if the storage engine fails.
    pub fn get(&self, id: &str) -> StoreResult<Option<T>> {
        let spec = QuerySpec {
            selection: Selection::by_id(id),
            ..QuerySpec::default()
        };
        let rows = self.core.engine.select(&self.core.table_name, &spec)?;
        rows.first()
            .map(|row| self.core.decode(&row.data))
            .transpose()
    }

    /// Overwrites the row stored under `id` with `record`.
    ///
    /// `record` may carry a different id, in which case the row moves to the
    /// new key. Never inserts; returns the number of rows changed (0 or 1).
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidRecord`] if the record has no id.
    /// - [`StoreError::Encode`] if the codec cannot encode the record.
    /// - [`StoreError::ConstraintViolation`] if the new id is already taken.
    /// - [`StoreError::Engine`] if the storage engine fails.
    pub fn update(&self, id: &str, record: &T) -> StoreResult<usize> {
        let row = self.encode(record)?;
        let table = self.core.table_name.as_str();

        match self.core.engine.update(table, id, row) {
            Ok(affected) => {
                tracing::debug!(table = %table, id = %id, affected, "update");
                Ok(affected)
            }
            Err(err) => {
                if let Some(EngineError::PrimaryKeyCollision { id: taken, .. }) =
                    err.downcast_ref::<EngineError>()
                {
                    tracing::warn!(table = %table, id = %id, to = %taken, "update rejected");
                    return Err(StoreError::ConstraintViolation {
                        table: table.to_string(),
                        id: taken.clone(),
                        policy: ConflictPolicy::Abort,
                    });
                }
                Err(err.into())
            }
        }
    }

    /// Removes the row stored under `id`. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the storage engine fails.
    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        let removed = self.core.engine.delete(&self.core.table_name, id)?;
        tracing::debug!(table = %self.core.table_name, id = %id, removed, "delete");
        Ok(removed > 0)
    }

    /// Removes the row stored under `record`'s id.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidRecord`] if the record has no id.
    /// - [`StoreError::Engine`] if the storage engine fails.
    pub fn delete_record(&self, record: &T) -> StoreResult<bool> {
        let id = record.id().ok_or_else(StoreError::missing_id)?;
        self.delete(id)
    }

    /// Removes every row. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the storage engine fails.
    pub fn delete_all(&self) -> StoreResult<usize> {
        let removed = self.core.engine.delete_all(&self.core.table_name)?;
        tracing::debug!(table = %self.core.table_name, removed, "delete all");
        Ok(removed)
    }

    /// Total number of rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the storage engine fails.
    pub fn count(&self) -> StoreResult<u64> {
        Ok(self.core.engine.row_count(&self.core.table_name)?)
    }

    /// Schema version currently recorded for the table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the storage engine fails.
    pub fn schema_version(&self) -> StoreResult<Option<u32>> {
        Ok(self.core.engine.schema_version(&self.core.table_name)?)
    }

    // -- queries --------------------------------------------------------

    /// The table's shared builder, reset to the empty state.
    ///
    /// Blocks while another caller holds it. Callers on other threads wait
    /// until the returned handle is dropped.
    #[must_use]
    pub fn query_builder(&self) -> SharedBuilder<T, C> {
        let mut builder = Mutex::lock_arc(&self.builder);
        builder.reset();
        builder
    }

    /// A fresh builder owned by the caller. Never caches.
    ///
    /// The preset queries below run on one of these, so they never wait on
    /// the shared builder.
    #[must_use]
    pub fn query(&self) -> QueryBuilder<T, C> {
        QueryBuilder::new(Arc::clone(&self.core), false)
    }

    /// Records whose type equals `record_type`.
    ///
    /// # Errors
    ///
    /// See [`CompiledQuery::query`](crate::query::CompiledQuery::query).
    pub fn by_type(&self, record_type: &str) -> StoreResult<Vec<T>> {
        let mut builder = self.query();
        builder.record_type(record_type);
        builder.build().query()
    }

    /// Records whose id lies in `[from, to]`, compared as strings.
    ///
    /// # Errors
    ///
    /// See [`CompiledQuery::query`](crate::query::CompiledQuery::query).
    pub fn between_ids(&self, from: &str, to: &str) -> StoreResult<Vec<T>> {
        let mut builder = self.query();
        builder.id_from(from).id_to(to);
        builder.build().query()
    }

    /// Records of type `record_type` whose id lies in `[from, to]`.
    ///
    /// # Errors
    ///
    /// See [`CompiledQuery::query`](crate::query::CompiledQuery::query).
    pub fn between_ids_with_type(
        &self,
        from: &str,
        to: &str,
        record_type: &str,
    ) -> StoreResult<Vec<T>> {
        let mut builder = self.query();
        builder.id_from(from).id_to(to).record_type(record_type);
        builder.build().query()
    }

    /// Records created in `[from, to]`, newest first.
    ///
    /// # Errors
    ///
    /// See [`CompiledQuery::query`](crate::query::CompiledQuery::query).
    pub fn created_between(&self, from: i64, to: i64) -> StoreResult<Vec<T>> {
        let mut builder = self.query();
        builder
            .created_from(from)
            .created_to(to)
            .order(Column::Created, Direction::Desc);
        builder.build().query()
    }

    /// Records of type `record_type` created in `[from, to]`, newest first.
    ///
    /// # Errors
    ///
    /// See [`CompiledQuery::query`](crate::query::CompiledQuery::query).
    pub fn created_between_with_type(
        &self,
        from: i64,
        to: i64,
        record_type: &str,
    ) -> StoreResult<Vec<T>> {
        let mut builder = self.query();
        builder
            .created_from(from)
            .created_to(to)
            .record_type(record_type)
            .order(Column::Created, Direction::Desc);
        builder.build().query()
    }

    /// Every constraint at once, newest first.
    ///
    /// `None` ids and type, and negative times, leave that constraint unset.
    ///
    /// # Errors
    ///
    /// See [`CompiledQuery::query`](crate::query::CompiledQuery::query).
    pub fn filtered(
        &self,
        id_from: Option<&str>,
        id_to: Option<&str>,
        record_type: Option<&str>,
        created_from: i64,
        created_to: i64,
    ) -> StoreResult<Vec<T>> {
        let mut builder = self.query();
        if let Some(from) = id_from {
            builder.id_from(from);
        }
        if let Some(to) = id_to {
            builder.id_to(to);
        }
        if let Some(record_type) = record_type {
            builder.record_type(record_type);
        }
        builder
            .created_from(created_from)
            .created_to(created_to)
            .order(Column::Created, Direction::Desc);
        builder.build().query()
    }

    /// The `limit` records with the greatest ids.
    ///
    /// # Errors
    ///
    /// See [`CompiledQuery::query`](crate::query::CompiledQuery::query).
    pub fn latest(&self, limit: usize) -> StoreResult<Vec<T>> {
        let mut builder = self.query();
        builder.order(Column::Id, Direction::Desc).limit(limit);
        builder.build().query()
    }

    fn encode(&self, record: &T) -> StoreResult<Row> {
        let mut row = Row::project(record, Vec::new())?;
        row.data = self
            .core
            .codec
            .encode(record)
            .map_err(|source| StoreError::Encode {
                table: self.core.table_name.clone(),
                id: row.id.clone(),
                source,
            })?;
        Ok(row)
    }
}

impl<T, C> RecordTable<T, C> {
    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.core.database_name
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.core.table_name
    }
}

impl<T, C> fmt::Debug for RecordTable<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordTable")
            .field("database", &self.core.database_name)
            .field("table", &self.core.table_name)
            .finish_non_exhaustive()
    }
}
