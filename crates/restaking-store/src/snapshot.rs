//! JSON snapshots of the full store.
//!
//! A snapshot is written to a temporary file in the destination directory
//! and renamed into place, so a crash mid-write never leaves a truncated
//! snapshot behind. Secondary indexes are not persisted except for the
//! withdrawal index, which has no primary table to rebuild from.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use restaking_types::{
    Avs, DerivedRecord, EigenPod, EventPosition, EventReceipt, Operator, OperatorSet,
    OperatorSetMembership, Staker, Strategy,
};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::WithdrawalIndexEntry;

/// Snapshot format version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The full contents of a store at one cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version.
    pub version: u32,
    /// Wall-clock time of capture.
    pub written_at: DateTime<Utc>,
    /// Position of the last applied event.
    pub cursor: Option<EventPosition>,
    /// Operators.
    pub operators: Vec<Operator>,
    /// AVSs.
    pub avss: Vec<Avs>,
    /// Operator sets.
    pub operator_sets: Vec<OperatorSet>,
    /// Strategies.
    pub strategies: Vec<Strategy>,
    /// Stakers.
    pub stakers: Vec<Staker>,
    /// Pods.
    pub pods: Vec<EigenPod>,
    /// Membership rows.
    pub memberships: Vec<OperatorSetMembership>,
    /// Derived records.
    pub records: Vec<DerivedRecord>,
    /// Receipts.
    pub receipts: Vec<EventReceipt>,
    /// Withdrawal root index.
    pub withdrawals: Vec<WithdrawalIndexEntry>,
}

impl Snapshot {
    /// Atomically write the snapshot to `path`.
    pub fn write_to(&self, path: &Path) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        tracing::info!(
            path = %path.display(),
            cursor = ?self.cursor,
            records = self.records.len(),
            "Snapshot written"
        );
        Ok(())
    }

    /// Read a snapshot from `path`.
    pub fn read_from(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Self = serde_json::from_reader(BufReader::new(file))?;
        tracing::info!(
            path = %path.display(),
            version = snapshot.version,
            written_at = %snapshot.written_at,
            cursor = ?snapshot.cursor,
            "Snapshot loaded"
        );
        Ok(snapshot)
    }
}
