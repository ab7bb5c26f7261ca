//! Durable [`StorageEngine`] implementation backed by a single [`redb`] file.
//!
//! Every record table maps to one redb table keyed by id, whose values are
//! `MsgPack`-encoded [`Row`]s. Schema versions live in a separate bookkeeping
//! table. Each engine call runs in its own redb transaction.

use std::path::Path;

use redb::{
    Database, ReadableTable, ReadableTableMetadata, TableDefinition, TableError, TableHandle,
    WriteTransaction,
};
use tristore_core::{Clause, ConflictPolicy, QuerySpec, Row};

use crate::storage::engine::{Ddl, EngineError, InsertOutcome, StorageEngine};

const SCHEMA_VERSIONS: TableDefinition<&str, u32> =
    TableDefinition::new("tristore.schema_versions");

/// Physical redb table name for a record table.
///
/// The prefix keeps record tables apart from the bookkeeping table.
fn physical_name(table: &str) -> String {
    format!("rows.{table}")
}

fn rows_table(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

fn encode_row(row: &Row) -> anyhow::Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(row)?)
}

fn decode_row(bytes: &[u8]) -> anyhow::Result<Row> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// File-backed storage for the tables of one database.
pub struct RedbEngine {
    db: Database,
}

impl RedbEngine {
    /// Opens the database file at `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not a redb file.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db = Database::create(path.as_ref())?;
        Ok(Self { db })
    }

    /// Fails with [`EngineError::NoSuchTable`] unless `name` exists.
    ///
    /// Needed because opening a table inside a write transaction creates it.
    fn require_table(txn: &WriteTransaction, table: &str, name: &str) -> anyhow::Result<()> {
        let exists = txn.list_tables()?.any(|handle| handle.name() == name);
        if exists {
            Ok(())
        } else {
            Err(EngineError::NoSuchTable(table.to_string()).into())
        }
    }
}

impl StorageEngine for RedbEngine {
    fn execute(&self, ddl: Ddl<'_>) -> anyhow::Result<()> {
        let txn = self.db.begin_write()?;
        match ddl {
            Ddl::CreateTable { table } => {
                let name = physical_name(table);
                txn.open_table(rows_table(&name))?;
            }
            Ddl::DropTable { table } => {
                let name = physical_name(table);
                txn.delete_table(rows_table(&name))?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn schema_version(&self, table: &str) -> anyhow::Result<Option<u32>> {
        let txn = self.db.begin_read()?;
        let versions = match txn.open_table(SCHEMA_VERSIONS) {
            Ok(versions) => versions,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let version = versions.get(table)?.map(|guard| guard.value());
        Ok(version)
    }

    fn set_schema_version(&self, table: &str, version: u32) -> anyhow::Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut versions = txn.open_table(SCHEMA_VERSIONS)?;
            versions.insert(table, version)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn insert(
        &self,
        table: &str,
        row: Row,
        policy: ConflictPolicy,
    ) -> anyhow::Result<InsertOutcome> {
        let name = physical_name(table);
        let bytes = encode_row(&row)?;

        let txn = self.db.begin_write()?;
        Self::require_table(&txn, table, &name)?;
        let outcome = {
            let mut rows = txn.open_table(rows_table(&name))?;
            let exists = rows.get(row.id.as_str())?.is_some();
            if !exists {
                rows.insert(row.id.as_str(), bytes.as_slice())?;
                InsertOutcome::Inserted
            } else if policy.rejects_collision() {
                InsertOutcome::Rejected
            } else if policy == ConflictPolicy::Ignore {
                InsertOutcome::Ignored
            } else {
                rows.insert(row.id.as_str(), bytes.as_slice())?;
                InsertOutcome::Replaced
            }
        };
        txn.commit()?;
        Ok(outcome)
    }

    fn update(&self, table: &str, id: &str, row: Row) -> anyhow::Result<usize> {
        let name = physical_name(table);
        let bytes = encode_row(&row)?;

        let txn = self.db.begin_write()?;
        Self::require_table(&txn, table, &name)?;
        let affected = {
            let mut rows = txn.open_table(rows_table(&name))?;
            if rows.get(id)?.is_none() {
                0
            } else if row.id != id && rows.get(row.id.as_str())?.is_some() {
                return Err(EngineError::PrimaryKeyCollision {
                    table: table.to_string(),
                    id: row.id,
                }
                .into());
            } else {
                rows.remove(id)?;
                rows.insert(row.id.as_str(), bytes.as_slice())?;
                1
            }
        };
        txn.commit()?;
        Ok(affected)
    }

    fn delete(&self, table: &str, id: &str) -> anyhow::Result<usize> {
        let name = physical_name(table);

        let txn = self.db.begin_write()?;
        Self::require_table(&txn, table, &name)?;
        let removed = {
            let mut rows = txn.open_table(rows_table(&name))?;
            let removed = rows.remove(id)?.is_some();
            usize::from(removed)
        };
        txn.commit()?;
        Ok(removed)
    }

    fn delete_all(&self, table: &str) -> anyhow::Result<usize> {
        let name = physical_name(table);

        let txn = self.db.begin_write()?;
        Self::require_table(&txn, table, &name)?;
        let removed = {
            let rows = txn.open_table(rows_table(&name))?;
            usize::try_from(rows.len()?)?
        };
        // Dropping and recreating inside one transaction empties the table atomically.
        txn.delete_table(rows_table(&name))?;
        txn.open_table(rows_table(&name))?;
        txn.commit()?;
        Ok(removed)
    }

    fn select(&self, table: &str, spec: &QuerySpec) -> anyhow::Result<Vec<Row>> {
        let name = physical_name(table);

        let txn = self.db.begin_read()?;
        let rows = match txn.open_table(rows_table(&name)) {
            Ok(rows) => rows,
            Err(TableError::TableDoesNotExist(_)) => {
                return Err(EngineError::NoSuchTable(table.to_string()).into())
            }
            Err(err) => return Err(err.into()),
        };

        // Point lookups skip the scan.
        if let [Clause::IdEquals { id }] = spec.selection.clauses() {
            return match rows.get(id.as_str())? {
                Some(guard) => Ok(vec![decode_row(guard.value())?]),
                None => Ok(Vec::new()),
            };
        }

        // redb iterates in key order, which gives the same natural order as
        // the in-memory engine.
        let mut decoded = Vec::new();
        for entry in rows.iter()? {
            let (_, value) = entry?;
            decoded.push(decode_row(value.value())?);
        }
        Ok(spec.apply(decoded))
    }

    fn row_count(&self, table: &str) -> anyhow::Result<u64> {
        let name = physical_name(table);

        let txn = self.db.begin_read()?;
        match txn.open_table(rows_table(&name)) {
            Ok(rows) => Ok(rows.len()?),
            Err(TableError::TableDoesNotExist(_)) => {
                Err(EngineError::NoSuchTable(table.to_string()).into())
            }
            Err(err) => Err(err.into()),
        }
    }
}
