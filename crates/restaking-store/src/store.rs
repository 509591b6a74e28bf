//! The entity store seam.
//!
//! Reconcilers never talk to storage directly. The engine reads through
//! [`EntityStore`] while staging a step and writes back exactly once per
//! applied event with [`EntityStore::commit`]. A [`CommitBatch`] holds
//! every dirty entity, the appended records, the receipt and the new
//! cursor, and is applied all-or-nothing.

use restaking_types::{
    Address, Avs, B256, DerivedRecord, EigenPod, EventPosition, EventReceipt, MembershipId,
    Operator, OperatorSet, OperatorSetId, OperatorSetMembership, RecordId, Staker, Strategy,
};

use crate::error::StoreError;

/// Keyed load/save access to entities, records and receipts.
///
/// Loads return owned copies; nothing a caller does to a loaded value is
/// visible to the store until it is committed.
pub trait EntityStore {
    /// Load an operator by address.
    fn operator(&self, address: &Address) -> Result<Option<Operator>, StoreError>;

    /// Load an AVS by address.
    fn avs(&self, address: &Address) -> Result<Option<Avs>, StoreError>;

    /// Load an operator set by id.
    fn operator_set(&self, id: &OperatorSetId) -> Result<Option<OperatorSet>, StoreError>;

    /// Load a strategy by address.
    fn strategy(&self, address: &Address) -> Result<Option<Strategy>, StoreError>;

    /// Load a staker by address.
    fn staker(&self, address: &Address) -> Result<Option<Staker>, StoreError>;

    /// Load a pod by pod address.
    fn eigen_pod(&self, address: &Address) -> Result<Option<EigenPod>, StoreError>;

    /// Load a membership row by id.
    fn membership(&self, id: &MembershipId) -> Result<Option<OperatorSetMembership>, StoreError>;

    /// Load the open membership of `operator` in `operator_set`, if any.
    fn open_membership(
        &self,
        operator: &Address,
        operator_set: &OperatorSetId,
    ) -> Result<Option<OperatorSetMembership>, StoreError>;

    /// Address of the pod owned by `owner`, if one was deployed.
    fn pod_of_owner(&self, owner: &Address) -> Result<Option<Address>, StoreError>;

    /// Staker that queued the withdrawal with root `root`, if known.
    fn withdrawal_staker(&self, root: &B256) -> Result<Option<Address>, StoreError>;

    /// Whether a derived record with id `id` is stored.
    fn has_record(&self, id: &RecordId) -> Result<bool, StoreError>;

    /// Load the receipt of an applied event.
    fn receipt(&self, id: &RecordId) -> Result<Option<EventReceipt>, StoreError>;

    /// Position of the last applied event.
    fn cursor(&self) -> Result<Option<EventPosition>, StoreError>;

    /// Atomically apply one step's writes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordExists`] or [`StoreError::ReceiptExists`]
    /// when the batch would overwrite append-only data. Nothing is written
    /// in that case.
    fn commit(&mut self, batch: CommitBatch) -> Result<(), StoreError>;
}

/// A queued withdrawal's root and the staker that queued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WithdrawalIndexEntry {
    /// Withdrawal root.
    pub root: B256,
    /// Queuing staker.
    pub staker: Address,
}

/// Every write produced by one applied event.
#[derive(Debug, Clone)]
pub struct CommitBatch {
    /// Dirty operators.
    pub operators: Vec<Operator>,
    /// Dirty AVSs.
    pub avss: Vec<Avs>,
    /// Dirty operator sets.
    pub operator_sets: Vec<OperatorSet>,
    /// Dirty strategies.
    pub strategies: Vec<Strategy>,
    /// Dirty stakers.
    pub stakers: Vec<Staker>,
    /// Dirty pods.
    pub pods: Vec<EigenPod>,
    /// Dirty membership rows.
    pub memberships: Vec<OperatorSetMembership>,
    /// Appended records.
    pub records: Vec<DerivedRecord>,
    /// New withdrawal index entries.
    pub withdrawals: Vec<WithdrawalIndexEntry>,
    /// Receipt of the applied event.
    pub receipt: EventReceipt,
    /// New cursor; never moves backwards.
    pub cursor: EventPosition,
}

impl CommitBatch {
    /// A batch carrying only a receipt and cursor.
    pub const fn new(receipt: EventReceipt, cursor: EventPosition) -> Self {
        Self {
            operators: Vec::new(),
            avss: Vec::new(),
            operator_sets: Vec::new(),
            strategies: Vec::new(),
            stakers: Vec::new(),
            pods: Vec::new(),
            memberships: Vec::new(),
            records: Vec::new(),
            withdrawals: Vec::new(),
            receipt,
            cursor,
        }
    }

    /// Number of entity writes in the batch.
    pub fn entity_writes(&self) -> usize {
        [
            self.operators.len(),
            self.avss.len(),
            self.operator_sets.len(),
            self.strategies.len(),
            self.stakers.len(),
            self.pods.len(),
            self.memberships.len(),
        ]
        .iter()
        .sum()
    }
}
