//! Storage layer for the restaking state index.
//!
//! The engine stages every step against an [`EntityStore`] and writes the
//! result back in one [`CommitBatch`]. [`MemoryStore`] is the in-process
//! implementation; [`Snapshot`] persists it to disk between runs.
//!
//! # Architecture
//!
//! ```text
//! Engine step
//!     |
//!     +-- load (owned copies) ---> EntityStore
//!     |
//!     +-- commit(CommitBatch) ---> entities + records + receipt + cursor
//!
//! Runner
//!     +-- every N events -------> Snapshot::write_to (temp file + rename)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`EntityStore`] trait and [`CommitBatch`]
//! - [`memory`] -- Ordered-map implementation with secondary indexes
//! - [`snapshot`] -- JSON snapshot format and atomic file writes
//! - [`error`] -- Shared error types

pub mod error;
pub mod memory;
pub mod snapshot;
pub mod store;

pub use error::StoreError;
pub use memory::{MemoryStore, StoreCounts};
pub use snapshot::{SNAPSHOT_VERSION, Snapshot};
pub use store::{CommitBatch, EntityStore, WithdrawalIndexEntry};
