//! Storage engine trait consumed by record tables.
//!
//! Defines [`StorageEngine`], the physical layer under a
//! [`RecordTable`](crate::table::RecordTable). An engine instance holds the
//! tables of one database. Every table has the fixed four-column [`Row`]
//! shape, so engines never see record types, only rows.

use tristore_core::{ConflictPolicy, QuerySpec, Row};

/// Schema statement for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ddl<'a> {
    /// Create the table if it does not exist yet.
    CreateTable { table: &'a str },
    /// Drop the table and all its rows if it exists.
    DropTable { table: &'a str },
}

/// What an insert did with its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// No row had the key; the row was inserted.
    Inserted,
    /// A row had the key and was overwritten (`Replace`).
    Replaced,
    /// A row had the key and was kept (`Ignore`).
    Ignored,
    /// A row had the key and the write was refused (`Abort`, `Fail`, `Rollback`).
    Rejected,
}

/// Typed failures an engine reports through `anyhow`.
///
/// Callers recover the variant with `anyhow::Error::downcast_ref`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no such table: {0}")]
    NoSuchTable(String),
    #[error("primary key {id} already exists in table {table}")]
    PrimaryKeyCollision { table: String, id: String },
}

/// Physical storage for the tables of one database.
///
/// All operations are blocking and each write is its own single-row
/// transaction. Operations on a table that was never created fail with
/// [`EngineError::NoSuchTable`].
///
/// Wrapped in `Arc<dyn StorageEngine>` so many tables can share one engine.
pub trait StorageEngine: Send + Sync + 'static {
    /// Apply a schema statement.
    fn execute(&self, ddl: Ddl<'_>) -> anyhow::Result<()>;

    /// Schema version recorded for `table`, or `None` if never recorded.
    fn schema_version(&self, table: &str) -> anyhow::Result<Option<u32>>;

    /// Record the schema version of `table`.
    fn set_schema_version(&self, table: &str, version: u32) -> anyhow::Result<()>;

    /// Insert `row`, resolving a primary-key collision with `policy`.
    fn insert(&self, table: &str, row: Row, policy: ConflictPolicy)
        -> anyhow::Result<InsertOutcome>;

    /// Overwrite the row whose key is `id` with `row` (which may carry a new
    /// key). Returns the number of rows affected, 0 or 1.
    ///
    /// Moving a row onto a key that is already taken fails with
    /// [`EngineError::PrimaryKeyCollision`].
    fn update(&self, table: &str, id: &str, row: Row) -> anyhow::Result<usize>;

    /// Remove the row whose key is `id`. Returns the number of rows removed.
    fn delete(&self, table: &str, id: &str) -> anyhow::Result<usize>;

    /// Remove every row. Returns the number of rows removed.
    fn delete_all(&self, table: &str) -> anyhow::Result<usize>;

    /// Return the rows matching `spec`, ordered and limited as it says.
    fn select(&self, table: &str, spec: &QuerySpec) -> anyhow::Result<Vec<Row>>;

    /// Number of rows in the table.
    fn row_count(&self, table: &str) -> anyhow::Result<u64>;
}
