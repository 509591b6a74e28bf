//! Indexer binary for the restaking state index.
//!
//! Streams decoded protocol events from a newline-delimited JSON file into
//! the reconciliation engine and keeps the resulting entity graph on disk
//! as a JSON snapshot.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as the first argument, or
//!    `restaking-index.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Restore the store from the last snapshot when resuming
//! 4. Open the event stream
//! 5. Process every event, snapshotting every N applied events
//! 6. Write the final snapshot and log the run summary

mod error;
mod source;

use std::path::{Path, PathBuf};
use std::time::Instant;

use restaking_engine::{EngineError, Indexer, IndexerConfig, LoggingConfig, StepOutcome, StoreConfig};
use restaking_store::{MemoryStore, Snapshot};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::IndexerError;
use crate::source::EventSource;

/// Configuration file read when no path is given.
const DEFAULT_CONFIG_PATH: &str = "restaking-index.yaml";

/// Application entry point for the indexer.
///
/// # Errors
///
/// Returns an error if configuration, the event file or a snapshot cannot
/// be read or written.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("restaking-indexer starting");
    info!(
        config_file = %config_path.display(),
        from_file,
        events_path = %config.input.events_path.display(),
        snapshot_path = %config.store.snapshot_path.display(),
        snapshot_every_events = config.store.snapshot_every_events,
        strict_ordering = config.engine.strict_ordering,
        "Configuration loaded"
    );

    // 3. Restore state.
    let store = open_store(&config.store)?;
    let mut indexer = Indexer::new(store, config.engine);

    // 4. Open the event stream.
    let mut events = EventSource::open(&config.input.events_path)?;
    info!(path = %config.input.events_path.display(), "Event stream opened");

    // 5. Process.
    let started = Instant::now();
    let mut since_snapshot: u64 = 0;
    let mut failed: u64 = 0;
    for event in &mut events {
        let event = event.map_err(|source| IndexerError::Source {
            path: config.input.events_path.clone(),
            source,
        })?;
        match indexer.process(&event) {
            Ok(StepOutcome::Applied { .. }) => {
                since_snapshot = since_snapshot.saturating_add(1);
                let every = config.store.snapshot_every_events;
                if every > 0 && since_snapshot >= every {
                    write_snapshot(indexer.store(), &config.store.snapshot_path)?;
                    since_snapshot = 0;
                }
            }
            Ok(_) => {}
            Err(e @ EngineError::Store(_)) => return Err(IndexerError::from(e).into()),
            Err(e) => {
                failed = failed.saturating_add(1);
                error!(
                    event_id = %event.meta.record_id(),
                    kind = %event.kind(),
                    error = %e,
                    "Event could not be processed; continuing"
                );
            }
        }
    }

    // 6. Persist and summarize.
    write_snapshot(indexer.store(), &config.store.snapshot_path)?;
    let stats = indexer.stats();
    let counts = indexer.store().counts();
    info!(
        lines = events.lines_read(),
        malformed = events.malformed(),
        processed = stats.processed,
        applied = stats.applied,
        skipped = stats.skipped,
        duplicates = stats.duplicates,
        dropped = stats.dropped,
        rejected = stats.rejected,
        failed,
        anomalies = stats.anomalies,
        records = stats.records,
        elapsed = ?started.elapsed(),
        "Event stream processed"
    );
    info!(
        operators = counts.operators,
        avss = counts.avss,
        operator_sets = counts.operator_sets,
        strategies = counts.strategies,
        stakers = counts.stakers,
        pods = counts.pods,
        memberships = counts.memberships,
        records = counts.records,
        "Store totals"
    );

    Ok(())
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist. Environment overrides apply either way.
fn load_config(path: &Path) -> Result<(IndexerConfig, bool), IndexerError> {
    if path.exists() {
        Ok((IndexerConfig::from_file(path)?, true))
    } else {
        let mut config = IndexerConfig::default();
        config.apply_env_overrides();
        Ok((config, false))
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Restore the store from the configured snapshot, or start empty.
fn open_store(config: &StoreConfig) -> Result<MemoryStore, IndexerError> {
    if !config.resume || !config.snapshot_path.exists() {
        info!(resume = config.resume, "Starting from an empty store");
        return Ok(MemoryStore::new());
    }
    let snapshot = Snapshot::read_from(&config.snapshot_path)?;
    let (cursor, written_at) = (snapshot.cursor, snapshot.written_at);
    let store = MemoryStore::from_snapshot(snapshot)?;
    info!(
        path = %config.snapshot_path.display(),
        cursor = ?cursor,
        written_at = %written_at,
        "Resumed from snapshot"
    );
    Ok(store)
}

fn write_snapshot(store: &MemoryStore, path: &Path) -> Result<(), IndexerError> {
    let snapshot = store.to_snapshot();
    snapshot.write_to(path)?;
    info!(
        path = %path.display(),
        cursor = ?snapshot.cursor,
        records = snapshot.records.len(),
        "Snapshot written"
    );
    Ok(())
}
