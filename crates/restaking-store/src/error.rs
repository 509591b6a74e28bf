//! Error types for the storage layer.
//!
//! All errors are propagated via [`StoreError`], which carries enough
//! context to tell which file or which record a failure concerns.

use std::path::PathBuf;

use restaking_types::RecordId;

/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A snapshot file could not be read or written.
    #[error("snapshot I/O error at {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A commit tried to write a record id that is already stored.
    #[error("record already stored: {0}")]
    RecordExists(RecordId),

    /// A commit tried to write a receipt that is already stored.
    #[error("event already committed: {0}")]
    ReceiptExists(RecordId),

    /// A snapshot was written by an incompatible version.
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedSnapshot {
        /// Version found in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },
}
