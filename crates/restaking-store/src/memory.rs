//! In-memory [`EntityStore`] backed by ordered maps.
//!
//! Besides the primary maps keyed by entity id, the store keeps three
//! secondary indexes that reconcilers need for lookups the event payload
//! does not key directly:
//!
//! ```text
//! (operator, set id) --> open MembershipId
//! pod owner          --> pod address
//! withdrawal root    --> queuing staker
//! ```
//!
//! Indexes are maintained by [`MemoryStore::commit`] and rebuilt from the
//! primary maps when restoring a snapshot.

use std::collections::BTreeMap;

use restaking_types::{
    Address, Avs, B256, DerivedRecord, EigenPod, EventPosition, EventReceipt, MembershipId,
    Operator, OperatorSet, OperatorSetId, OperatorSetMembership, RecordId, Staker, Strategy,
};

use crate::error::StoreError;
use crate::snapshot::{SNAPSHOT_VERSION, Snapshot};
use crate::store::{CommitBatch, EntityStore, WithdrawalIndexEntry};

/// Row counts per table, for summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreCounts {
    /// Operators.
    pub operators: usize,
    /// AVSs.
    pub avss: usize,
    /// Operator sets.
    pub operator_sets: usize,
    /// Strategies.
    pub strategies: usize,
    /// Stakers.
    pub stakers: usize,
    /// Pods.
    pub pods: usize,
    /// Membership rows, open and closed.
    pub memberships: usize,
    /// Derived records.
    pub records: usize,
    /// Receipts.
    pub receipts: usize,
}

/// An in-memory entity store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    operators: BTreeMap<Address, Operator>,
    avss: BTreeMap<Address, Avs>,
    operator_sets: BTreeMap<OperatorSetId, OperatorSet>,
    strategies: BTreeMap<Address, Strategy>,
    stakers: BTreeMap<Address, Staker>,
    pods: BTreeMap<Address, EigenPod>,
    memberships: BTreeMap<MembershipId, OperatorSetMembership>,
    records: BTreeMap<RecordId, DerivedRecord>,
    receipts: BTreeMap<RecordId, EventReceipt>,
    cursor: Option<EventPosition>,

    open_memberships: BTreeMap<(Address, OperatorSetId), MembershipId>,
    pods_by_owner: BTreeMap<Address, Address>,
    withdrawals: BTreeMap<B256, Address>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Row counts per table.
    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            operators: self.operators.len(),
            avss: self.avss.len(),
            operator_sets: self.operator_sets.len(),
            strategies: self.strategies.len(),
            stakers: self.stakers.len(),
            pods: self.pods.len(),
            memberships: self.memberships.len(),
            records: self.records.len(),
            receipts: self.receipts.len(),
        }
    }

    /// All operators, ordered by address.
    pub fn operators(&self) -> impl Iterator<Item = &Operator> {
        self.operators.values()
    }

    /// All AVSs, ordered by address.
    pub fn avss(&self) -> impl Iterator<Item = &Avs> {
        self.avss.values()
    }

    /// All operator sets, ordered by id.
    pub fn operator_sets(&self) -> impl Iterator<Item = &OperatorSet> {
        self.operator_sets.values()
    }

    /// All strategies, ordered by address.
    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.values()
    }

    /// All stakers, ordered by address.
    pub fn stakers(&self) -> impl Iterator<Item = &Staker> {
        self.stakers.values()
    }

    /// All pods, ordered by address.
    pub fn pods(&self) -> impl Iterator<Item = &EigenPod> {
        self.pods.values()
    }

    /// All membership rows, ordered by id.
    pub fn memberships(&self) -> impl Iterator<Item = &OperatorSetMembership> {
        self.memberships.values()
    }

    /// All derived records, ordered by id.
    pub fn records(&self) -> impl Iterator<Item = &DerivedRecord> {
        self.records.values()
    }

    /// Look up one derived record.
    pub fn record(&self, id: &RecordId) -> Option<&DerivedRecord> {
        self.records.get(id)
    }

    /// Capture the full store contents.
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            written_at: chrono::Utc::now(),
            cursor: self.cursor,
            operators: self.operators.values().cloned().collect(),
            avss: self.avss.values().cloned().collect(),
            operator_sets: self.operator_sets.values().cloned().collect(),
            strategies: self.strategies.values().cloned().collect(),
            stakers: self.stakers.values().cloned().collect(),
            pods: self.pods.values().cloned().collect(),
            memberships: self.memberships.values().cloned().collect(),
            records: self.records.values().cloned().collect(),
            receipts: self.receipts.values().cloned().collect(),
            withdrawals: self
                .withdrawals
                .iter()
                .map(|(root, staker)| WithdrawalIndexEntry {
                    root: *root,
                    staker: *staker,
                })
                .collect(),
        }
    }

    /// Restore a store from a snapshot, rebuilding secondary indexes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedSnapshot`] when the snapshot was
    /// written by a different format version.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedSnapshot {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let mut store = Self {
            cursor: snapshot.cursor,
            ..Self::default()
        };
        for op in snapshot.operators {
            store.operators.insert(op.address, op);
        }
        for avs in snapshot.avss {
            store.avss.insert(avs.address, avs);
        }
        for set in snapshot.operator_sets {
            store.operator_sets.insert(set.id.clone(), set);
        }
        for strategy in snapshot.strategies {
            store.strategies.insert(strategy.address, strategy);
        }
        for staker in snapshot.stakers {
            store.stakers.insert(staker.address, staker);
        }
        for pod in snapshot.pods {
            store.put_pod(pod);
        }
        for membership in snapshot.memberships {
            store.put_membership(membership);
        }
        for record in snapshot.records {
            store.records.insert(record.id().clone(), record);
        }
        for receipt in snapshot.receipts {
            store.receipts.insert(receipt.id.clone(), receipt);
        }
        for entry in snapshot.withdrawals {
            store.withdrawals.insert(entry.root, entry.staker);
        }

        tracing::debug!(
            operators = store.operators.len(),
            records = store.records.len(),
            open_memberships = store.open_memberships.len(),
            "Store restored from snapshot"
        );
        Ok(store)
    }

    fn put_pod(&mut self, pod: EigenPod) {
        self.pods_by_owner.insert(pod.owner, pod.address);
        self.pods.insert(pod.address, pod);
    }

    fn put_membership(&mut self, membership: OperatorSetMembership) {
        let pair = (membership.operator, membership.operator_set.clone());
        if membership.is_active() {
            self.open_memberships.insert(pair, membership.id.clone());
        } else if self.open_memberships.get(&pair) == Some(&membership.id) {
            self.open_memberships.remove(&pair);
        }
        self.memberships.insert(membership.id.clone(), membership);
    }
}

impl EntityStore for MemoryStore {
    fn operator(&self, address: &Address) -> Result<Option<Operator>, StoreError> {
        Ok(self.operators.get(address).cloned())
    }

    fn avs(&self, address: &Address) -> Result<Option<Avs>, StoreError> {
        Ok(self.avss.get(address).cloned())
    }

    fn operator_set(&self, id: &OperatorSetId) -> Result<Option<OperatorSet>, StoreError> {
        Ok(self.operator_sets.get(id).cloned())
    }

    fn strategy(&self, address: &Address) -> Result<Option<Strategy>, StoreError> {
        Ok(self.strategies.get(address).cloned())
    }

    fn staker(&self, address: &Address) -> Result<Option<Staker>, StoreError> {
        Ok(self.stakers.get(address).cloned())
    }

    fn eigen_pod(&self, address: &Address) -> Result<Option<EigenPod>, StoreError> {
        Ok(self.pods.get(address).cloned())
    }

    fn membership(&self, id: &MembershipId) -> Result<Option<OperatorSetMembership>, StoreError> {
        Ok(self.memberships.get(id).cloned())
    }

    fn open_membership(
        &self,
        operator: &Address,
        operator_set: &OperatorSetId,
    ) -> Result<Option<OperatorSetMembership>, StoreError> {
        Ok(self
            .open_memberships
            .get(&(*operator, operator_set.clone()))
            .and_then(|id| self.memberships.get(id))
            .cloned())
    }

    fn pod_of_owner(&self, owner: &Address) -> Result<Option<Address>, StoreError> {
        Ok(self.pods_by_owner.get(owner).copied())
    }

    fn withdrawal_staker(&self, root: &B256) -> Result<Option<Address>, StoreError> {
        Ok(self.withdrawals.get(root).copied())
    }

    fn has_record(&self, id: &RecordId) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(id))
    }

    fn receipt(&self, id: &RecordId) -> Result<Option<EventReceipt>, StoreError> {
        Ok(self.receipts.get(id).cloned())
    }

    fn cursor(&self) -> Result<Option<EventPosition>, StoreError> {
        Ok(self.cursor)
    }

    fn commit(&mut self, batch: CommitBatch) -> Result<(), StoreError> {
        // Validate append-only tables before touching anything.
        if self.receipts.contains_key(&batch.receipt.id) {
            return Err(StoreError::ReceiptExists(batch.receipt.id));
        }
        if let Some(existing) = batch.records.iter().find(|r| self.records.contains_key(r.id())) {
            return Err(StoreError::RecordExists(existing.id().clone()));
        }

        let entity_writes = batch.entity_writes();
        let record_count = batch.records.len();

        for op in batch.operators {
            self.operators.insert(op.address, op);
        }
        for avs in batch.avss {
            self.avss.insert(avs.address, avs);
        }
        for set in batch.operator_sets {
            self.operator_sets.insert(set.id.clone(), set);
        }
        for strategy in batch.strategies {
            self.strategies.insert(strategy.address, strategy);
        }
        for staker in batch.stakers {
            self.stakers.insert(staker.address, staker);
        }
        for pod in batch.pods {
            self.put_pod(pod);
        }
        for membership in batch.memberships {
            self.put_membership(membership);
        }
        for record in batch.records {
            self.records.insert(record.id().clone(), record);
        }
        for entry in batch.withdrawals {
            self.withdrawals.insert(entry.root, entry.staker);
        }

        let id = batch.receipt.id.clone();
        self.receipts.insert(id.clone(), batch.receipt);
        self.cursor = Some(self.cursor.map_or(batch.cursor, |c| c.max(batch.cursor)));

        tracing::trace!(
            event = %id,
            entity_writes,
            records = record_count,
            "Step committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use restaking_types::{EventKind, EventMeta, ListChange, RecordBody};

    use super::*;

    fn meta(block: u64, log: u64) -> EventMeta {
        EventMeta {
            tx_hash: B256::repeat_byte(u8::try_from(block).unwrap_or(u8::MAX)),
            log_index: log,
            block_number: block,
            block_timestamp: block.saturating_mul(12),
            contract: Address::ZERO,
        }
    }

    fn batch_for(meta: &EventMeta) -> CommitBatch {
        let receipt = EventReceipt {
            id: meta.record_id(),
            position: meta.position(),
            kind: EventKind::StrategyAddedToDepositWhitelist,
            record_count: 1,
        };
        let mut batch = CommitBatch::new(receipt, meta.position());
        batch.records.push(DerivedRecord::new(
            meta,
            Vec::new(),
            RecordBody::StrategyWhitelist {
                strategy: Address::repeat_byte(0x05),
                change: ListChange::Added,
            },
        ));
        batch
    }

    fn membership(open: bool) -> OperatorSetMembership {
        let op = Address::repeat_byte(0x01);
        let set = OperatorSetId::new(&Address::repeat_byte(0x02), 0);
        OperatorSetMembership {
            id: MembershipId::new(&op, &set, 10),
            operator: op,
            operator_set: set,
            joined_at: 10,
            joined_at_block: 1,
            join_record: RecordId::new(&B256::ZERO, 0),
            left_at: if open { None } else { Some(20) },
            left_at_block: if open { None } else { Some(2) },
            leave_record: None,
        }
    }

    #[test]
    fn commit_writes_records_receipt_and_cursor() {
        let mut store = MemoryStore::new();
        let m = meta(5, 0);
        let result = store.commit(batch_for(&m));
        assert!(result.is_ok());
        assert!(matches!(store.has_record(&m.record_id()), Ok(true)));
        assert!(matches!(store.receipt(&m.record_id()), Ok(Some(_))));
        assert_eq!(store.cursor().ok().flatten(), Some(m.position()));
    }

    #[test]
    fn commit_rejects_existing_receipt_without_writing() {
        let mut store = MemoryStore::new();
        let m = meta(5, 0);
        assert!(store.commit(batch_for(&m)).is_ok());

        let mut again = batch_for(&m);
        again.strategies.push(Strategy::new(Address::repeat_byte(0x09), 1));
        let result = store.commit(again);
        assert!(matches!(result, Err(StoreError::ReceiptExists(_))));
        assert_eq!(store.counts().strategies, 0);
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let mut store = MemoryStore::new();
        assert!(store.commit(batch_for(&meta(9, 0))).is_ok());
        assert!(store.commit(batch_for(&meta(3, 0))).is_ok());
        assert_eq!(store.cursor().ok().flatten().map(|c| c.block_number), Some(9));
    }

    #[test]
    fn open_membership_index_follows_row_state() {
        let mut store = MemoryStore::new();
        let open = membership(true);
        let op = open.operator;
        let set = open.operator_set.clone();

        let mut batch = batch_for(&meta(1, 0));
        batch.memberships.push(open);
        assert!(store.commit(batch).is_ok());
        assert!(matches!(store.open_membership(&op, &set), Ok(Some(_))));

        let mut batch = batch_for(&meta(2, 0));
        batch.memberships.push(membership(false));
        assert!(store.commit(batch).is_ok());
        assert!(matches!(store.open_membership(&op, &set), Ok(None)));
        assert_eq!(store.counts().memberships, 1);
    }

    #[test]
    fn pod_owner_index_resolves_pod() {
        let mut store = MemoryStore::new();
        let owner = Address::repeat_byte(0x03);
        let pod_addr = Address::repeat_byte(0x0A);
        let m = meta(1, 0);
        let mut batch = batch_for(&m);
        batch.pods.push(EigenPod::new(pod_addr, owner, 12, m.record_id()));
        assert!(store.commit(batch).is_ok());
        assert_eq!(store.pod_of_owner(&owner).ok().flatten(), Some(pod_addr));
    }

    #[test]
    fn snapshot_restore_rebuilds_indexes() {
        let mut store = MemoryStore::new();
        let open = membership(true);
        let op = open.operator;
        let set = open.operator_set.clone();
        let mut batch = batch_for(&meta(1, 0));
        batch.memberships.push(open);
        batch.withdrawals.push(WithdrawalIndexEntry {
            root: B256::repeat_byte(0x77),
            staker: Address::repeat_byte(0x03),
        });
        assert!(store.commit(batch).is_ok());

        let restored = MemoryStore::from_snapshot(store.to_snapshot());
        assert!(restored.is_ok());
        let restored = restored.unwrap_or_default();
        assert!(matches!(restored.open_membership(&op, &set), Ok(Some(_))));
        assert_eq!(
            restored.withdrawal_staker(&B256::repeat_byte(0x77)).ok().flatten(),
            Some(Address::repeat_byte(0x03))
        );
        assert_eq!(restored.counts(), store.counts());
    }

    #[test]
    fn snapshot_version_is_checked() {
        let mut snapshot = MemoryStore::new().to_snapshot();
        snapshot.version = SNAPSHOT_VERSION.saturating_add(1);
        let result = MemoryStore::from_snapshot(snapshot);
        assert!(matches!(result, Err(StoreError::UnsupportedSnapshot { .. })));
    }
}
