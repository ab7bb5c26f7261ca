//! In-memory [`StorageEngine`] implementation backed by [`DashMap`].
//!
//! Each table is an ordered map keyed by id, so the natural (unordered) result
//! order is ascending id. Suitable for tests and ephemeral data.

use std::collections::BTreeMap;

use dashmap::DashMap;
use tristore_core::{Clause, ConflictPolicy, QuerySpec, Row};

use crate::storage::engine::{Ddl, EngineError, InsertOutcome, StorageEngine};

type Table = BTreeMap<String, Row>;

/// In-memory storage for the tables of one database.
///
/// Writers lock only the shard holding their table, so tables can be written
/// concurrently; rows within one table are serialized by that shard lock.
#[derive(Default)]
pub struct MemoryEngine {
    tables: DashMap<String, Table>,
    versions: DashMap<String, u32>,
}

impl MemoryEngine {
    /// Creates a new, empty `MemoryEngine`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn missing(table: &str) -> anyhow::Error {
        EngineError::NoSuchTable(table.to_string()).into()
    }
}

impl StorageEngine for MemoryEngine {
    fn execute(&self, ddl: Ddl<'_>) -> anyhow::Result<()> {
        match ddl {
            Ddl::CreateTable { table } => {
                self.tables.entry(table.to_string()).or_default();
            }
            Ddl::DropTable { table } => {
                self.tables.remove(table);
            }
        }
        Ok(())
    }

    fn schema_version(&self, table: &str) -> anyhow::Result<Option<u32>> {
        Ok(self.versions.get(table).map(|v| *v))
    }

    fn set_schema_version(&self, table: &str, version: u32) -> anyhow::Result<()> {
        self.versions.insert(table.to_string(), version);
        Ok(())
    }

    fn insert(
        &self,
        table: &str,
        row: Row,
        policy: ConflictPolicy,
    ) -> anyhow::Result<InsertOutcome> {
        let mut rows = self.tables.get_mut(table).ok_or_else(|| Self::missing(table))?;

        if !rows.contains_key(&row.id) {
            rows.insert(row.id.clone(), row);
            return Ok(InsertOutcome::Inserted);
        }

        if policy.rejects_collision() {
            return Ok(InsertOutcome::Rejected);
        }
        if policy == ConflictPolicy::Ignore {
            return Ok(InsertOutcome::Ignored);
        }
        rows.insert(row.id.clone(), row);
        Ok(InsertOutcome::Replaced)
    }

    fn update(&self, table: &str, id: &str, row: Row) -> anyhow::Result<usize> {
        let mut rows = self.tables.get_mut(table).ok_or_else(|| Self::missing(table))?;

        if !rows.contains_key(id) {
            return Ok(0);
        }
        if row.id != id && rows.contains_key(&row.id) {
            return Err(EngineError::PrimaryKeyCollision {
                table: table.to_string(),
                id: row.id,
            }
            .into());
        }

        rows.remove(id);
        rows.insert(row.id.clone(), row);
        Ok(1)
    }

    fn delete(&self, table: &str, id: &str) -> anyhow::Result<usize> {
        let mut rows = self.tables.get_mut(table).ok_or_else(|| Self::missing(table))?;
        Ok(usize::from(rows.remove(id).is_some()))
    }

    fn delete_all(&self, table: &str) -> anyhow::Result<usize> {
        let mut rows = self.tables.get_mut(table).ok_or_else(|| Self::missing(table))?;
        let removed = rows.len();
        rows.clear();
        Ok(removed)
    }

    fn select(&self, table: &str, spec: &QuerySpec) -> anyhow::Result<Vec<Row>> {
        let rows = self.tables.get(table).ok_or_else(|| Self::missing(table))?;

        // Point lookups skip the scan.
        if let [Clause::IdEquals { id }] = spec.selection.clauses() {
            return Ok(rows.get(id).cloned().into_iter().collect());
        }

        Ok(spec.apply(rows.values().cloned()))
    }

    fn row_count(&self, table: &str) -> anyhow::Result<u64> {
        let rows = self.tables.get(table).ok_or_else(|| Self::missing(table))?;
        Ok(rows.len() as u64)
    }
}
