//! Error types for the reconciliation engine.
//!
//! Per-event anomalies (missing parents, clamped counters, rejected steps)
//! are values, not errors; see [`crate::guard::Anomaly`] and
//! [`crate::reconcile::SkipReason`]. [`EngineError`] is reserved for
//! failures that stop one event from being processed at all.

use restaking_store::StoreError;
use restaking_types::RecordId;

/// Errors that can occur while processing one event.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The entity store failed to load or commit.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A derived record id is already taken.
    ///
    /// Record ids are unique per source log, so a collision means the
    /// stream or a reconciler is broken. The event is not applied.
    #[error("derived record id collision: {id}")]
    RecordCollision {
        /// The colliding id.
        id: RecordId,
    },
}
