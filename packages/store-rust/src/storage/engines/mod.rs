//! [`StorageEngine`](super::StorageEngine) implementations.
//!
//! [`MemoryEngine`] is always available. [`RedbEngine`] needs the `redb`
//! feature, which is on by default.

mod memory;
#[cfg(feature = "redb")]
mod redb;

pub use memory::MemoryEngine;
#[cfg(feature = "redb")]
pub use self::redb::RedbEngine;
