use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::record::Record;

/// One physical row of a record table.
///
/// `id`, `record_type` and `created` are a queryable projection of the
/// header that also lives inside `data` (the codec encodes the whole record).
/// Whoever writes a row is responsible for keeping the projection in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Primary key.
    pub id: String,
    /// Free-form discriminator, `None` when the record carries no type.
    pub record_type: Option<String>,
    /// Encoded payload of the full record.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Creation time in epoch millis.
    pub created: i64,
}

impl Row {
    /// Projects a record header plus its encoded payload into a row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRecord`] if the record has no id.
    pub fn project<R: Record>(record: &R, data: Vec<u8>) -> StoreResult<Self> {
        let meta = record.meta();
        let id = meta.id().ok_or_else(StoreError::missing_id)?;

        Ok(Self {
            id: id.to_string(),
            record_type: meta.record_type().map(str::to_string),
            data,
            created: meta.created_at(),
        })
    }
}

/// The four columns of a record table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Id,
    Type,
    Data,
    Created,
}

impl Column {
    /// Column name as it appears in the physical table.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Type => "type",
            Column::Data => "data",
            Column::Created => "created",
        }
    }

    /// Compares two rows by this column only.
    ///
    /// Absent types sort before present ones, and `data` compares bytewise,
    /// mirroring how SQL engines order NULLs and blobs.
    #[must_use]
    pub fn compare(self, a: &Row, b: &Row) -> Ordering {
        match self {
            Column::Id => a.id.cmp(&b.id),
            Column::Type => a.record_type.cmp(&b.record_type),
            Column::Data => a.data.cmp(&b.data),
            Column::Created => a.created.cmp(&b.created),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Sort direction of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
    /// No ordering: results come back in the engine's natural order.
    #[default]
    None,
}

impl Direction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
            Direction::None => "NONE",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule applied when a write's primary key collides with an existing row.
///
/// Every write is a single-row operation, so `Abort`, `Fail` and `Rollback`
/// behave the same way: the colliding write is rejected and the stored row
/// is left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    Abort,
    Fail,
    /// Keep the existing row and drop the new one silently.
    Ignore,
    /// Overwrite the existing row.
    #[default]
    Replace,
    Rollback,
}

impl ConflictPolicy {
    /// Returns `true` if a primary-key collision must fail the write.
    #[must_use]
    pub fn rejects_collision(self) -> bool {
        matches!(
            self,
            ConflictPolicy::Abort | ConflictPolicy::Fail | ConflictPolicy::Rollback
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictPolicy::Abort => "abort",
            ConflictPolicy::Fail => "fail",
            ConflictPolicy::Ignore => "ignore",
            ConflictPolicy::Replace => "replace",
            ConflictPolicy::Rollback => "rollback",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordMeta;

    #[derive(Serialize, Deserialize)]
    struct Note {
        meta: RecordMeta,
    }

    impl Record for Note {
        fn meta(&self) -> &RecordMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut RecordMeta {
            &mut self.meta
        }
    }

    fn row(id: &str, record_type: Option<&str>, created: i64) -> Row {
        Row {
            id: id.to_string(),
            record_type: record_type.map(str::to_string),
            data: Vec::new(),
            created,
        }
    }

    #[test]
    fn project_copies_header_columns() {
        let note = Note {
            meta: RecordMeta::with_id("n-1").with_type("memo").with_created_at(42),
        };

        let projected = Row::project(&note, vec![1, 2, 3]).unwrap();
        assert_eq!(projected.id, "n-1");
        assert_eq!(projected.record_type.as_deref(), Some("memo"));
        assert_eq!(projected.created, 42);
        assert_eq!(projected.data, vec![1, 2, 3]);
    }

    #[test]
    fn project_without_id_is_invalid() {
        let mut note = Note {
            meta: RecordMeta::with_id("n-1"),
        };
        note.meta.clear_id();

        let err = Row::project(&note, Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), StoreError::missing_id().to_string());
    }

    #[test]
    fn column_keys_match_physical_names() {
        let columns = [Column::Id, Column::Type, Column::Data, Column::Created];
        let keys: Vec<String> = columns.iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["id", "type", "data", "created"]);
    }

    #[test]
    fn absent_type_sorts_first() {
        let untyped = row("a", None, 0);
        let typed = row("b", Some("A"), 0);

        assert_eq!(Column::Type.compare(&untyped, &typed), Ordering::Less);
        assert_eq!(Column::Type.compare(&typed, &untyped), Ordering::Greater);
    }

    #[test]
    fn id_comparison_is_lexicographic() {
        assert_eq!(
            Column::Id.compare(&row("10", None, 0), &row("9", None, 0)),
            Ordering::Less
        );
    }

    #[test]
    fn conflict_policy_defaults_to_replace() {
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::Replace);
        assert!(!ConflictPolicy::Replace.rejects_collision());
        assert!(!ConflictPolicy::Ignore.rejects_collision());
        assert!(ConflictPolicy::Abort.rejects_collision());
        assert!(ConflictPolicy::Fail.rejects_collision());
        assert!(ConflictPolicy::Rollback.rejects_collision());
    }

    #[test]
    fn conflict_policy_deserializes_lowercase() {
        let policy: ConflictPolicy = serde_json::from_str("\"ignore\"").unwrap();
        assert_eq!(policy, ConflictPolicy::Ignore);
    }
}
