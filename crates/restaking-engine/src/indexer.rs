//! The single-writer indexer.
//!
//! [`Indexer::process`] is the per-event commit boundary:
//!
//! ```text
//!  event ──► receipt? ──yes──► Duplicate
//!              │no
//!              ▼
//!          dispatch ──none──► Dropped
//!              │
//!              ▼
//!         reconciler ──skip──► Skipped        (arena discarded)
//!              │applied
//!              ▼
//!            guard ──blocking──► Rejected     (arena discarded)
//!              │
//!              ▼
//!      commit(CommitBatch) ──► Applied
//! ```
//!
//! Either every entity, record and the receipt of an event reach the store
//! in one commit, or nothing does.

use restaking_store::EntityStore;
use restaking_types::{EventReceipt, ProtocolEvent};

use crate::config::EngineConfig;
use crate::dispatch::{self, Domain};
use crate::error::EngineError;
use crate::guard::{self, Anomaly, GuardPolicy};
use crate::reconcile::{Context, Outcome, Severity, SkipReason};
use crate::resolver::Resolver;

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step was committed. Carries any repaired anomalies.
    Applied {
        /// Non-blocking guard findings.
        anomalies: Vec<Anomaly>,
    },
    /// The reconciler left state unchanged.
    Skipped(SkipReason),
    /// The event was already applied.
    Duplicate,
    /// No reconciler handles the event.
    Dropped,
    /// The guard refused to commit the step.
    Rejected {
        /// Every guard finding, at least one of them blocking.
        anomalies: Vec<Anomaly>,
    },
}

/// Per-outcome event counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexerStats {
    /// Events handed to [`Indexer::process`].
    pub processed: u64,
    /// Committed steps.
    pub applied: u64,
    /// Skipped events.
    pub skipped: u64,
    /// Already-applied events.
    pub duplicates: u64,
    /// Events without a reconciler.
    pub dropped: u64,
    /// Steps refused by the guard.
    pub rejected: u64,
    /// Guard findings across all steps.
    pub anomalies: u64,
    /// Derived records committed.
    pub records: u64,
}

impl IndexerStats {
    fn count(&mut self, outcome: &StepOutcome) {
        let slot = match outcome {
            StepOutcome::Applied { anomalies } | StepOutcome::Rejected { anomalies } => {
                let found = u64::try_from(anomalies.len()).unwrap_or(u64::MAX);
                self.anomalies = self.anomalies.saturating_add(found);
                if matches!(outcome, StepOutcome::Applied { .. }) {
                    &mut self.applied
                } else {
                    &mut self.rejected
                }
            }
            StepOutcome::Skipped(_) => &mut self.skipped,
            StepOutcome::Duplicate => &mut self.duplicates,
            StepOutcome::Dropped => &mut self.dropped,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Applies an ordered event stream to an [`EntityStore`].
pub struct Indexer<S: EntityStore> {
    store: S,
    policy: GuardPolicy,
    stats: IndexerStats,
}

impl<S: EntityStore> Indexer<S> {
    /// Create an indexer over `store`, resuming from whatever it holds.
    pub const fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            policy: GuardPolicy {
                strict_ordering: config.strict_ordering,
            },
            stats: IndexerStats {
                processed: 0,
                applied: 0,
                skipped: 0,
                duplicates: 0,
                dropped: 0,
                rejected: 0,
                anomalies: 0,
                records: 0,
            },
        }
    }

    /// Counts so far.
    pub const fn stats(&self) -> IndexerStats {
        self.stats
    }

    /// The backing store, for queries and snapshots.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Give the backing store back.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Apply one event.
    ///
    /// Per-event anomalies are reported in the returned [`StepOutcome`].
    /// An `Err` means this event could not be processed at all (store
    /// failure or a record id collision); the stream may continue.
    pub fn process(&mut self, event: &ProtocolEvent) -> Result<StepOutcome, EngineError> {
        self.stats.processed = self.stats.processed.saturating_add(1);
        let outcome = self.step(event)?;
        self.stats.count(&outcome);
        Ok(outcome)
    }

    fn step(&mut self, event: &ProtocolEvent) -> Result<StepOutcome, EngineError> {
        let meta = &event.meta;
        let event_id = meta.record_id();
        let kind = event.kind();

        if self.store.receipt(&event_id)?.is_some() {
            tracing::debug!(event_id = %event_id, kind = %kind, "Event already applied");
            return Ok(StepOutcome::Duplicate);
        }

        let Some(domain) = dispatch::domain_of(kind) else {
            tracing::warn!(event_id = %event_id, position = %meta.position(), "No reconciler for event; dropped");
            return Ok(StepOutcome::Dropped);
        };

        let mut cx = Context::new(meta, Resolver::new(&self.store));
        let Some(result) = dispatch::dispatch(&mut cx, &event.payload) else {
            return Ok(StepOutcome::Dropped);
        };
        if let Outcome::Skipped(reason) = result? {
            log_skip(event_id.as_str(), kind.name(), domain, &reason);
            return Ok(StepOutcome::Skipped(reason));
        }

        let mut arena = cx.resolver.into_arena();
        let anomalies = guard::inspect(&mut arena, &self.store, meta, self.policy)?;
        if anomalies.iter().any(Anomaly::is_blocking) {
            tracing::error!(
                event_id = %event_id,
                kind = %kind,
                anomalies = anomalies.len(),
                "Step rejected by invariant guard"
            );
            return Ok(StepOutcome::Rejected { anomalies });
        }

        let record_count = arena.records.len();
        let writes = arena.dirty_count();
        let receipt = EventReceipt {
            id: event_id.clone(),
            position: meta.position(),
            kind,
            record_count,
        };
        self.store.commit(arena.into_batch(receipt, meta.position()))?;
        self.stats.records = self
            .stats
            .records
            .saturating_add(u64::try_from(record_count).unwrap_or(u64::MAX));

        tracing::debug!(
            event_id = %event_id,
            kind = %kind,
            domain = domain.name(),
            entities = writes,
            records = record_count,
            "Step committed"
        );
        Ok(StepOutcome::Applied { anomalies })
    }
}

fn log_skip(event_id: &str, kind: &str, domain: Domain, reason: &SkipReason) {
    match reason.severity() {
        Severity::Error => tracing::error!(
            event_id,
            kind,
            domain = domain.name(),
            reason = %reason,
            "Event skipped"
        ),
        Severity::Warning => tracing::warn!(
            event_id,
            kind,
            domain = domain.name(),
            reason = %reason,
            "Event skipped"
        ),
    }
}
