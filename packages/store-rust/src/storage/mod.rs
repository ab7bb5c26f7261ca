//! Physical storage layer for record tables.
//!
//! - [`StorageEngine`]: the blocking, row-level engine interface
//! - [`engines`]: in-memory and redb-backed implementations

pub mod engine;
pub mod engines;

pub use engine::*;
pub use engines::*;
