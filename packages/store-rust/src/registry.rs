use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tristore_core::{Codec, ConflictPolicy, MsgPackCodec, Record, StoreError, StoreResult};

use crate::database::Database;
use crate::storage::InsertOutcome;
use crate::table::{RecordTable, SharedBuilder};

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps record types to their tables across every registered database.
///
/// Constructed explicitly and passed to whoever needs it; there is no global
/// instance. Lookup is by `TypeId`, so each record type lives in at most one
/// table. Registering a database that also stores an already-registered type
/// rebinds that type to the newer table.
pub struct Registry {
    /// Type-based lookup: `TypeId` -> `Arc<RecordTable<T, C>>`.
    by_type: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    /// Registered databases in registration order.
    databases: RwLock<Vec<Arc<Database>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_type: DashMap::new(),
            databases: RwLock::new(Vec::new()),
        }
    }

    /// Register every table of `database`.
    pub fn register(&self, database: Database) -> Arc<Database> {
        let database = Arc::new(database);
        for (type_id, table) in database.tables() {
            if self.by_type.insert(type_id, Arc::clone(table)).is_some() {
                tracing::warn!(
                    database = %database.name(),
                    "record type already registered, rebinding to new table"
                );
            }
        }
        self.databases.write().push(Arc::clone(&database));
        tracing::info!(
            database = %database.name(),
            tables = database.table_count(),
            "database registered"
        );
        database
    }

    /// Retrieve a registered database by name.
    pub fn database(&self, name: &str) -> Option<Arc<Database>> {
        self.databases
            .read()
            .iter()
            .find(|database| database.name() == name)
            .cloned()
    }

    /// Names of all registered databases, in registration order.
    pub fn database_names(&self) -> Vec<String> {
        self.databases
            .read()
            .iter()
            .map(|database| database.name().to_string())
            .collect()
    }

    /// The table storing records of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableNotRegistered`] if no registered database
    /// stores `T`.
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
    /// Returns [`StoreError::TableNotRegistered`] if no registered database
    /// stores `T` with codec `C`.
    pub fn table_with_codec<T, C>(&self) -> StoreResult<Arc<RecordTable<T, C>>>
    where
        T: Record,
        C: Codec<T>,
    {
        self.by_type
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value().clone().downcast::<RecordTable<T, C>>().ok())
            .ok_or_else(|| StoreError::TableNotRegistered {
                type_name: type_name::<T>(),
            })
    }

    /// Point lookup of a `T` by id.
    ///
    /// # Errors
    ///
    /// [`StoreError::TableNotRegistered`], or any error of [`RecordTable::get`].
    pub fn load<T>(&self, id: &str) -> StoreResult<Option<T>>
    where
        T: Record,
        MsgPackCodec: Codec<T>,
    {
        self.table::<T>()?.get(id)
    }

    /// The shared builder of `T`'s table, reset to the empty state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableNotRegistered`] if no table stores `T`.
    pub fn query<T>(&self) -> StoreResult<SharedBuilder<T>>
    where
        T: Record,
        MsgPackCodec: Codec<T>,
    {
        Ok(self.table::<T>()?.query_builder())
    }

    /// Stores `record` in its table, overwriting any row with the same id.
    ///
    /// # Errors
    ///
    /// [`StoreError::TableNotRegistered`], or any error of [`RecordTable::put`].
    pub fn save<T>(&self, record: &T) -> StoreResult<()>
    where
        T: Record,
        MsgPackCodec: Codec<T>,
    {
        self.table::<T>()?.put(record)
    }

    /// Stores `record` in its table under conflict policy `policy`.
    ///
    /// # Errors
    ///
    /// [`StoreError::TableNotRegistered`], or any error of
    /// [`RecordTable::put_with`].
    pub fn save_with<T>(&self, record: &T, policy: ConflictPolicy) -> StoreResult<InsertOutcome>
    where
        T: Record,
        MsgPackCodec: Codec<T>,
    {
        self.table::<T>()?.put_with(record, policy)
    }

    /// Removes `record` from its table. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// [`StoreError::TableNotRegistered`], or any error of
    /// [`RecordTable::delete_record`].
    pub fn remove<T>(&self, record: &T) -> StoreResult<bool>
    where
        T: Record,
        MsgPackCodec: Codec<T>,
    {
        self.table::<T>()?.delete_record(record)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
