//! Per-event working set.
//!
//! A [`StepArena`] lives for exactly one event. Every entity a reconciler
//! touches is staged here as a [`Staged`] pair: the value as loaded from the
//! store (or `None` when created in this step) and the working copy. Records
//! appended by the reconciler queue up alongside.
//!
//! Nothing reaches the store until the invariant guard has inspected the
//! arena and [`StepArena::into_batch`] turns it into a single
//! [`CommitBatch`]. Dropping the arena discards the step.

use std::collections::BTreeMap;

use restaking_store::{CommitBatch, WithdrawalIndexEntry};
use restaking_types::{
    Address, Avs, Counters, DerivedRecord, EigenPod, EntityKey, EventPosition, EventReceipt,
    MembershipId, Operator, OperatorSet, OperatorSetId, OperatorSetMembership, Staker, Strategy,
};

/// An entity as loaded and as modified in the current step.
#[derive(Debug, Clone)]
pub struct Staged<T> {
    /// Stored value before the step; `None` when created in this step.
    pub before: Option<T>,
    /// Working copy.
    pub after: T,
}

impl<T: Clone + PartialEq> Staged<T> {
    /// Stage an entity loaded from the store.
    pub fn loaded(value: T) -> Self {
        Self {
            before: Some(value.clone()),
            after: value,
        }
    }

    /// Stage an entity created in this step.
    pub const fn created(value: T) -> Self {
        Self {
            before: None,
            after: value,
        }
    }

    /// Whether the entity was created in this step.
    pub const fn is_created(&self) -> bool {
        self.before.is_none()
    }

    /// Whether the working copy differs from what is stored.
    pub fn is_dirty(&self) -> bool {
        self.before.as_ref() != Some(&self.after)
    }
}

/// Everything one event has staged.
#[derive(Debug, Default)]
pub struct StepArena {
    /// Staged operators.
    pub operators: BTreeMap<Address, Staged<Operator>>,
    /// Staged AVSs.
    pub avss: BTreeMap<Address, Staged<Avs>>,
    /// Staged operator sets.
    pub operator_sets: BTreeMap<OperatorSetId, Staged<OperatorSet>>,
    /// Staged strategies.
    pub strategies: BTreeMap<Address, Staged<Strategy>>,
    /// Staged stakers.
    pub stakers: BTreeMap<Address, Staged<Staker>>,
    /// Staged pods.
    pub pods: BTreeMap<Address, Staged<EigenPod>>,
    /// Staged membership rows.
    pub memberships: BTreeMap<MembershipId, Staged<OperatorSetMembership>>,
    /// Records appended in this step.
    pub records: Vec<DerivedRecord>,
    /// Withdrawal roots queued in this step.
    pub withdrawals: Vec<WithdrawalIndexEntry>,
}

impl StepArena {
    /// Whether `key` names an entity staged in this step.
    pub fn contains(&self, key: &EntityKey) -> bool {
        match key {
            EntityKey::Operator(a) => self.operators.contains_key(a),
            EntityKey::Avs(a) => self.avss.contains_key(a),
            EntityKey::OperatorSet(id) => self.operator_sets.contains_key(id),
            EntityKey::Strategy(a) => self.strategies.contains_key(a),
            EntityKey::Staker(a) => self.stakers.contains_key(a),
            EntityKey::EigenPod(a) => self.pods.contains_key(a),
            EntityKey::Membership(id) => self.memberships.contains_key(id),
        }
    }

    /// Every working copy that carries counters, for the guard to inspect.
    pub fn counter_holders(&mut self) -> Vec<&mut dyn Counters> {
        let mut out: Vec<&mut dyn Counters> = Vec::new();
        out.extend(self.operators.values_mut().map(|s| &mut s.after as &mut dyn Counters));
        out.extend(self.avss.values_mut().map(|s| &mut s.after as &mut dyn Counters));
        out.extend(self.operator_sets.values_mut().map(|s| &mut s.after as &mut dyn Counters));
        out.extend(self.strategies.values_mut().map(|s| &mut s.after as &mut dyn Counters));
        out.extend(self.stakers.values_mut().map(|s| &mut s.after as &mut dyn Counters));
        out.extend(self.pods.values_mut().map(|s| &mut s.after as &mut dyn Counters));
        out
    }

    /// Number of staged entities that would be written.
    pub fn dirty_count(&self) -> usize {
        fn dirty<K, T: Clone + PartialEq>(map: &BTreeMap<K, Staged<T>>) -> usize {
            map.values().filter(|s| s.is_dirty()).count()
        }
        [
            dirty(&self.operators),
            dirty(&self.avss),
            dirty(&self.operator_sets),
            dirty(&self.strategies),
            dirty(&self.stakers),
            dirty(&self.pods),
            dirty(&self.memberships),
        ]
        .iter()
        .sum()
    }

    /// Turn the arena into one atomic batch of dirty entities and records.
    pub fn into_batch(self, receipt: EventReceipt, cursor: EventPosition) -> CommitBatch {
        fn dirty<K, T: Clone + PartialEq>(map: BTreeMap<K, Staged<T>>) -> Vec<T> {
            map.into_values()
                .filter(Staged::is_dirty)
                .map(|s| s.after)
                .collect()
        }

        let mut batch = CommitBatch::new(receipt, cursor);
        batch.operators = dirty(self.operators);
        batch.avss = dirty(self.avss);
        batch.operator_sets = dirty(self.operator_sets);
        batch.strategies = dirty(self.strategies);
        batch.stakers = dirty(self.stakers);
        batch.pods = dirty(self.pods);
        batch.memberships = dirty(self.memberships);
        batch.records = self.records;
        batch.withdrawals = self.withdrawals;
        batch
    }
}

#[cfg(test)]
mod tests {
    use restaking_types::{B256, EventKind};

    use super::*;

    fn receipt() -> EventReceipt {
        EventReceipt {
            id: restaking_types::RecordId::new(&B256::ZERO, 0),
            position: EventPosition { block_number: 1, log_index: 0 },
            kind: EventKind::Deposit,
            record_count: 0,
        }
    }

    #[test]
    fn unchanged_loaded_entity_is_not_dirty() {
        let staged = Staged::loaded(Strategy::new(Address::repeat_byte(0x05), 1));
        assert!(!staged.is_dirty());
        assert!(!staged.is_created());
    }

    #[test]
    fn created_entity_is_dirty() {
        let staged = Staged::created(Strategy::new(Address::repeat_byte(0x05), 1));
        assert!(staged.is_dirty());
        assert!(staged.is_created());
    }

    #[test]
    fn batch_contains_only_dirty_entities() {
        let mut arena = StepArena::default();
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);
        arena.operators.insert(a, Staged::loaded(Operator::new(a, 1)));
        let mut touched = Staged::loaded(Operator::new(b, 1));
        touched.after.touch(9);
        arena.operators.insert(b, touched);

        assert_eq!(arena.dirty_count(), 1);
        assert!(arena.contains(&EntityKey::Operator(a)));

        let batch = arena.into_batch(receipt(), EventPosition { block_number: 1, log_index: 0 });
        assert_eq!(batch.operators.len(), 1);
        assert_eq!(batch.operators.first().map(|o| o.address), Some(b));
    }

    #[test]
    fn counter_holders_cover_every_counted_kind() {
        let mut arena = StepArena::default();
        let a = Address::repeat_byte(0x01);
        arena.operators.insert(a, Staged::created(Operator::new(a, 1)));
        arena.stakers.insert(a, Staged::created(Staker::new(a, 1)));
        assert_eq!(arena.counter_holders().len(), 2);
    }
}
