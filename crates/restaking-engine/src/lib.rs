//! State-reconciliation engine for the restaking state index.
//!
//! Consumes an ordered stream of decoded protocol events and folds each one
//! into a consistent entity graph plus an append-only log of derived
//! records. Every event is one atomic step.
//!
//! # Architecture
//!
//! ```text
//! ProtocolEvent
//!     |
//!     v
//! Indexer::process
//!     |-- receipt lookup (idempotence)
//!     |-- dispatch::domain_of / dispatch::dispatch
//!     |       |
//!     |       +-- reconcile::<domain>::<handler>(Context, payload)
//!     |               |
//!     |               +-- Resolver (load / get-or-create) --> StepArena
//!     |
//!     |-- guard::inspect(StepArena)  symmetry, links, non-negativity
//!     |
//!     +-- EntityStore::commit(CommitBatch)
//! ```
//!
//! # Modules
//!
//! - [`indexer`] -- The per-event commit boundary and run statistics
//! - [`dispatch`] -- Static event-to-reconciler routing
//! - [`reconcile`] -- Per-domain reconcilers
//! - [`resolver`] -- Identity resolution and get-or-create
//! - [`arena`] -- Per-step staging of entities and records
//! - [`guard`] -- Invariant checks and repairs before commit
//! - [`config`] -- YAML configuration with env overrides
//! - [`error`] -- Engine error types

pub mod arena;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod indexer;
pub mod reconcile;
pub mod resolver;

pub use config::{ConfigError, EngineConfig, IndexerConfig, InputConfig, LoggingConfig, StoreConfig};
pub use dispatch::{Domain, domain_of};
pub use error::EngineError;
pub use guard::{Anomaly, AnomalyKind, GuardPolicy};
pub use indexer::{Indexer, IndexerStats, StepOutcome};
pub use reconcile::{Outcome, Severity, SkipReason};
