//! Error taxonomy for the record store.
//!
//! None of these errors are retried internally. Empty result sets and
//! missing keys are ordinary results, never errors.

use crate::codec::CodecError;
use crate::types::ConflictPolicy;

/// Errors surfaced by record tables, databases and registries.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A local precondition on the record was violated (e.g. missing id).
    #[error("invalid record: {reason}")]
    InvalidRecord { reason: String },

    /// No database registered a table for the requested record type.
    #[error("no table registered for record type {type_name}")]
    TableNotRegistered { type_name: &'static str },

    /// The record type has no table declaration.
    #[error("record type {type_name} has no table declaration")]
    AnnotationMissing { type_name: &'static str },

    /// The record type has more than one distinct table declaration.
    #[error("record type {type_name} has {count} conflicting table declarations")]
    AnnotationConflict {
        type_name: &'static str,
        count: usize,
    },

    /// A stored payload could not be decoded. Aborts the whole read.
    #[error("failed to decode payload from table {table}: {source}")]
    Decode {
        table: String,
        #[source]
        source: CodecError,
    },

    /// A record could not be encoded for writing.
    #[error("failed to encode record {id} for table {table}: {source}")]
    Encode {
        table: String,
        id: String,
        #[source]
        source: CodecError,
    },

    /// Tables of one logical database declare different database names.
    #[error("table {table} belongs to database {found}, but database {expected} is being built")]
    SchemaConflict {
        expected: String,
        found: String,
        table: String,
    },

    /// A write collided with an existing primary key under a rejecting policy.
    #[error("record {id} already exists in table {table} (conflict policy {policy})")]
    ConstraintViolation {
        table: String,
        id: String,
        policy: ConflictPolicy,
    },

    /// The requested schema version is older than the stored one.
    #[error("table {table} is at schema version {stored}, cannot open it at version {requested}")]
    SchemaDowngrade {
        table: String,
        stored: u32,
        requested: u32,
    },

    /// The storage engine failed.
    #[error("storage engine error: {0}")]
    Engine(#[from] anyhow::Error),
}

impl StoreError {
    /// The record to write or delete carries no id.
    #[must_use]
    pub fn missing_id() -> Self {
        StoreError::InvalidRecord {
            reason: "record id is not set".to_string(),
        }
    }
}

/// Result alias used throughout the store.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violation_names_policy() {
        let err = StoreError::ConstraintViolation {
            table: "notes".to_string(),
            id: "1".to_string(),
            policy: ConflictPolicy::Abort,
        };
        assert_eq!(
            err.to_string(),
            "record 1 already exists in table notes (conflict policy abort)"
        );
    }

    #[test]
    fn missing_id_is_an_invalid_record() {
        let err = StoreError::missing_id();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
        assert_eq!(err.to_string(), "invalid record: record id is not set");
    }

    #[test]
    fn engine_errors_convert_from_anyhow() {
        let err: StoreError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, StoreError::Engine(_)));
        assert_eq!(err.to_string(), "storage engine error: disk full");
    }

    #[test]
    fn decode_error_keeps_codec_source() {
        let source = rmp_serde::from_slice::<String>(&[0xc1]).unwrap_err();
        let err = StoreError::Decode {
            table: "notes".to_string(),
            source: CodecError::MsgPackDecode(source),
        };
        assert!(std::error::Error::source(&err).is_some());
    }
}
