//! Error types for the indexer binary.
//!
//! [`IndexerError`] is the top-level error type that wraps every failure
//! that stops a run. Failures confined to one event are logged and counted
//! by the main loop instead.

use std::path::PathBuf;

/// Top-level error for the indexer binary.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: restaking_engine::ConfigError,
    },

    /// Snapshot load or write failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: restaking_store::StoreError,
    },

    /// The engine could not reach its store.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: restaking_engine::EngineError,
    },

    /// The event file could not be opened or read.
    #[error("event source error at {path}: {source}")]
    Source {
        /// Event file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
