//! Record header shared by every stored type.
//!
//! A storable type embeds a [`RecordMeta`] and implements [`Record`] to expose
//! it. The header carries the three queryable columns (`id`, `type`,
//! `created`); the rest of the type is opaque to the store and travels inside
//! the encoded payload.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Abstraction over the system clock for dependency injection.
///
/// Lets tests pin `created_at` (and therefore the derived default id) to a
/// known value. The default implementation ([`SystemClock`]) reads
/// `std::time::SystemTime`.
pub trait ClockSource: Send + Sync {
    /// Returns the current time as milliseconds since Unix epoch.
    fn now(&self) -> i64;
}

/// Default clock source that reads the real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    // Millisecond timestamps fit comfortably in i64 until the year 292 million.
    #[allow(clippy::cast_possible_truncation)]
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}

/// The queryable header of a stored record.
///
/// A fresh header is stamped with the current time, and its id defaults to
/// that time in whole seconds. Two headers created within the same second
/// therefore share an id unless the caller assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    id: Option<String>,
    #[serde(rename = "type")]
    record_type: Option<String>,
    created_at: i64,
}

impl RecordMeta {
    /// Creates a header stamped with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(&SystemClock)
    }

    /// Creates a header stamped with `clock`, defaulting the id to the
    /// stamp in whole seconds.
    #[must_use]
    pub fn with_clock(clock: &dyn ClockSource) -> Self {
        let created_at = clock.now();
        Self {
            id: Some((created_at / 1000).abs().to_string()),
            record_type: None,
            created_at,
        }
    }

    /// Creates a header with an explicit id, stamped with the system clock.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new()
        }
    }

    /// Sets the type discriminator, consuming and returning the header.
    #[must_use]
    pub fn with_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = Some(record_type.into());
        self
    }

    /// Sets the creation time, consuming and returning the header.
    #[must_use]
    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[must_use]
    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Removes the id. Storing a header without id is rejected.
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    #[must_use]
    pub fn record_type(&self) -> Option<&str> {
        self.record_type.as_deref()
    }

    pub fn set_record_type(&mut self, record_type: Option<String>) {
        self.record_type = record_type;
    }

    /// Creation (or last modification) time in epoch millis.
    #[must_use]
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn set_created_at(&mut self, created_at: i64) {
        self.created_at = created_at;
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record(id->{}, type->{}, created->{})",
            self.id.as_deref().unwrap_or("null"),
            self.record_type.as_deref().unwrap_or("null"),
            self.created_at
        )
    }
}

/// A type that can be stored in a record table.
///
/// Implementors embed a [`RecordMeta`]; the provided accessors read the
/// queryable columns from it.
pub trait Record: Send + Sync + 'static {
    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    fn id(&self) -> Option<&str> {
        self.meta().id()
    }

    fn record_type(&self) -> Option<&str> {
        self.meta().record_type()
    }

    fn created_at(&self) -> i64 {
        self.meta().created_at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(i64);

    impl ClockSource for FixedClock {
        fn now(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn system_clock_returns_nonzero() {
        assert!(SystemClock.now() > 0);
    }

    #[test]
    fn default_id_is_creation_time_in_seconds() {
        let meta = RecordMeta::with_clock(&FixedClock(1_700_000_123_456));
        assert_eq!(meta.created_at(), 1_700_000_123_456);
        assert_eq!(meta.id(), Some("1700000123"));
        assert_eq!(meta.record_type(), None);
    }

    #[test]
    fn headers_within_one_second_share_default_id() {
        let a = RecordMeta::with_clock(&FixedClock(5_000));
        let b = RecordMeta::with_clock(&FixedClock(5_999));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn setters_update_header() {
        let mut meta = RecordMeta::with_id("a");
        meta.set_id("b");
        meta.set_record_type(Some("kind".to_string()));
        meta.set_created_at(7);

        assert_eq!(meta.id(), Some("b"));
        assert_eq!(meta.record_type(), Some("kind"));
        assert_eq!(meta.created_at(), 7);

        meta.clear_id();
        assert!(!meta.has_id());
    }

    #[test]
    fn display_shows_null_for_missing_fields() {
        let mut meta = RecordMeta::with_id("x").with_created_at(3);
        assert_eq!(meta.to_string(), "Record(id->x, type->null, created->3)");

        meta.clear_id();
        assert_eq!(meta.to_string(), "Record(id->null, type->null, created->3)");
    }

    #[test]
    fn serializes_type_field_under_its_column_name() {
        let meta = RecordMeta::with_id("x").with_type("A").with_created_at(1);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], "A");
        assert_eq!(json["createdAt"], 1);
    }
}
