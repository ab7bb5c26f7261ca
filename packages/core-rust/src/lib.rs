//! `TriStore` Core: record header, payload codecs, query compilation and errors.

pub mod codec;
pub mod error;
pub mod query;
pub mod record;
pub mod schema;
pub mod types;

pub use codec::{Codec, CodecError, JsonCodec, MsgPackCodec};
pub use error::{StoreError, StoreResult};
pub use query::{Clause, OrderBy, QueryFilter, QuerySpec, Selection, UNSET_TIME};
pub use record::{ClockSource, Record, RecordMeta, SystemClock};
pub use schema::{MetadataResolver, TableMeta};
pub use types::{Column, ConflictPolicy, Direction, Row};
