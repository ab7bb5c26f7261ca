//! `TriStore`: typed record tables, databases and a fluent query builder over storage engines.

pub mod config;
pub mod database;
pub mod query;
pub mod registry;
pub mod storage;
pub mod table;

pub use config::{DatabaseConfig, EngineConfig, TableConfig};
pub use database::{Database, DatabaseBuilder, DEFAULT_DATABASE_NAME};
pub use query::{CompiledQuery, QueryBuilder};
pub use registry::Registry;
#[cfg(feature = "redb")]
pub use storage::RedbEngine;
pub use storage::{Ddl, EngineError, InsertOutcome, MemoryEngine, StorageEngine};
pub use table::{RecordTable, SharedBuilder};

pub use tristore_core::{
    Clause, ClockSource, Codec, CodecError, Column, ConflictPolicy, Direction, JsonCodec,
    MetadataResolver, MsgPackCodec, OrderBy, QueryFilter, QuerySpec, Record, RecordMeta, Row,
    Selection, StoreError, StoreResult, SystemClock, TableMeta, UNSET_TIME,
};
