//! Invariant guard.
//!
//! Runs once per event, after the reconciler and before the commit. It sees
//! the whole [`StepArena`], so it can compare every staged entity with the
//! value it was loaded as.
//!
//! | Check | On violation |
//! |---|---|
//! | Record id unique in step and store | `Err(RecordCollision)` |
//! | Event after the committed cursor | anomaly, blocking when strict |
//! | Record links resolve inside the step | blocking anomaly |
//! | At most one open membership per pair | blocking anomaly |
//! | Membership counters move with rows | blocking anomaly |
//! | Delegator counters move with stakers | blocking anomaly |
//! | Counters never below zero | clamp to zero + anomaly |
//! | Strategy shares never below zero | clamp to zero + anomaly, share records rewritten |
//! | Pod shares below zero | anomaly only |
//!
//! Symmetry is checked on the raw staged values, before any clamping, so
//! a clamp can never mask a reconciler that moved only one side.

use std::collections::BTreeSet;
use std::fmt;

use restaking_store::EntityStore;
use restaking_types::{
    Address, Counter, EntityKey, EventMeta, EventPosition, I256, OperatorSetId, RecordBody, RecordId,
};

use crate::arena::{StepArena, Staged};
use crate::error::EngineError;

/// Guard settings taken from the engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardPolicy {
    /// Reject events at or before the committed cursor instead of applying
    /// them with an anomaly.
    pub strict_ordering: bool,
}

/// What the guard found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnomalyKind {
    /// A counter was staged below zero and clamped.
    NegativeCounter {
        /// Owning entity.
        entity: EntityKey,
        /// Counter field name.
        field: &'static str,
        /// Value before clamping.
        value: Counter,
    },
    /// A share total was staged below zero.
    NegativeShares {
        /// Owning entity.
        entity: EntityKey,
        /// Staged total.
        value: I256,
        /// Whether the total was clamped to zero.
        clamped: bool,
    },
    /// Membership counters and membership rows moved by different amounts.
    MembershipAsymmetry {
        /// Net change of `Operator.operator_set_count`.
        operator_delta: Counter,
        /// Net change of `OperatorSet.member_count`.
        set_delta: Counter,
        /// Rows opened minus rows closed.
        row_delta: Counter,
    },
    /// Delegator counters and staker delegation state moved by different
    /// amounts.
    DelegationAsymmetry {
        /// Net change of `Operator.delegator_count`.
        counter_delta: Counter,
        /// Stakers that became delegated minus those that stopped.
        staker_delta: Counter,
    },
    /// A record links an entity that is not part of this step.
    DanglingReference {
        /// Linking record.
        record: RecordId,
        /// Unresolved key.
        key: EntityKey,
    },
    /// More than one open membership row for the same pair.
    DuplicateOpenMembership {
        /// Operator.
        operator: Address,
        /// Set.
        operator_set: OperatorSetId,
    },
    /// The event is not after the last committed position.
    OutOfOrder {
        /// Event position.
        position: EventPosition,
        /// Last committed position.
        cursor: EventPosition,
    },
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeCounter { entity, field, value } => {
                write!(f, "{entity}.{field} reached {value}; clamped to 0")
            }
            Self::NegativeShares { entity, value, clamped: true } => {
                write!(f, "{entity} shares reached {value}; clamped to 0")
            }
            Self::NegativeShares { entity, value, clamped: false } => {
                write!(f, "{entity} shares are negative ({value})")
            }
            Self::MembershipAsymmetry {
                operator_delta,
                set_delta,
                row_delta,
            } => write!(
                f,
                "membership counters out of step: operators {operator_delta:+}, sets {set_delta:+}, rows {row_delta:+}"
            ),
            Self::DelegationAsymmetry {
                counter_delta,
                staker_delta,
            } => write!(
                f,
                "delegator counters out of step: operators {counter_delta:+}, stakers {staker_delta:+}"
            ),
            Self::DanglingReference { record, key } => {
                write!(f, "record {record} links {key}, which is not in this step")
            }
            Self::DuplicateOpenMembership { operator, operator_set } => write!(
                f,
                "operator {} has more than one open membership in {operator_set}",
                restaking_types::address_id(operator)
            ),
            Self::OutOfOrder { position, cursor } => {
                write!(f, "event at {position} is not after cursor {cursor}")
            }
        }
    }
}

/// One guard finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    /// What was found.
    pub kind: AnomalyKind,
    blocking: bool,
}

impl Anomaly {
    const fn blocking(kind: AnomalyKind) -> Self {
        Self { kind, blocking: true }
    }

    const fn repaired(kind: AnomalyKind) -> Self {
        Self { kind, blocking: false }
    }

    /// Whether this finding prevents the step from being committed.
    pub const fn is_blocking(&self) -> bool {
        self.blocking
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

/// Inspect and repair `arena` for the event described by `meta`.
///
/// Returns every anomaly found; the caller rejects the step if any is
/// blocking. A record id collision is returned as an error instead.
pub fn inspect(
    arena: &mut StepArena,
    store: &dyn EntityStore,
    meta: &EventMeta,
    policy: GuardPolicy,
) -> Result<Vec<Anomaly>, EngineError> {
    check_record_ids(arena, store)?;

    let mut found = Vec::new();
    check_ordering(store, meta.position(), policy, &mut found)?;
    check_links(arena, &mut found);
    check_open_memberships(arena, store, &mut found)?;
    check_membership_symmetry(arena, &mut found);
    check_delegation_symmetry(arena, &mut found);
    clamp_counters(arena, &mut found);
    clamp_shares(arena, &mut found);

    let event_id = meta.record_id();
    for anomaly in &found {
        tracing::error!(
            event_id = %event_id,
            blocking = anomaly.is_blocking(),
            anomaly = %anomaly,
            "Invariant violation"
        );
    }
    Ok(found)
}

fn check_record_ids(arena: &StepArena, store: &dyn EntityStore) -> Result<(), EngineError> {
    let mut seen = BTreeSet::new();
    for record in &arena.records {
        let id = record.id();
        if !seen.insert(id) || store.has_record(id)? {
            return Err(EngineError::RecordCollision { id: id.clone() });
        }
    }
    Ok(())
}

fn check_ordering(
    store: &dyn EntityStore,
    position: EventPosition,
    policy: GuardPolicy,
    found: &mut Vec<Anomaly>,
) -> Result<(), EngineError> {
    if let Some(cursor) = store.cursor()?
        && position <= cursor
    {
        let kind = AnomalyKind::OutOfOrder { position, cursor };
        found.push(if policy.strict_ordering {
            Anomaly::blocking(kind)
        } else {
            Anomaly::repaired(kind)
        });
    }
    Ok(())
}

fn check_links(arena: &StepArena, found: &mut Vec<Anomaly>) {
    for record in &arena.records {
        for key in record.links.iter().filter(|k| !arena.contains(k)) {
            found.push(Anomaly::blocking(AnomalyKind::DanglingReference {
                record: record.id().clone(),
                key: key.clone(),
            }));
        }
    }
}

fn check_open_memberships(
    arena: &StepArena,
    store: &dyn EntityStore,
    found: &mut Vec<Anomaly>,
) -> Result<(), EngineError> {
    let mut pairs = BTreeSet::new();
    for staged in arena.memberships.values().filter(|s| s.after.is_active()) {
        let row = &staged.after;
        let pair = (row.operator, row.operator_set.clone());
        let duplicate_in_step = !pairs.insert(pair);

        // The store index still names rows closed earlier in this step.
        let duplicate_in_store = store
            .open_membership(&row.operator, &row.operator_set)?
            .is_some_and(|other| {
                other.id != row.id
                    && arena
                        .memberships
                        .get(&other.id)
                        .is_none_or(|s| s.after.is_active())
            });

        if duplicate_in_step || duplicate_in_store {
            found.push(Anomaly::blocking(AnomalyKind::DuplicateOpenMembership {
                operator: row.operator,
                operator_set: row.operator_set.clone(),
            }));
        }
    }
    Ok(())
}

/// Net change of one counter field across a staged map.
fn counter_delta<K, T: Clone + PartialEq>(
    map: &std::collections::BTreeMap<K, Staged<T>>,
    field: impl Fn(&T) -> Counter,
) -> Counter {
    map.values().fold(0, |acc: Counter, s| {
        let before = s.before.as_ref().map_or(0, &field);
        acc.saturating_add(field(&s.after).saturating_sub(before))
    })
}

/// +1 for a false-to-true transition, -1 for true-to-false, 0 otherwise.
const fn transition(before: bool, after: bool) -> Counter {
    match (before, after) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

fn check_membership_symmetry(arena: &StepArena, found: &mut Vec<Anomaly>) {
    let operator_delta = counter_delta(&arena.operators, |o| o.operator_set_count);
    let set_delta = counter_delta(&arena.operator_sets, |s| s.member_count);
    let row_delta = arena.memberships.values().fold(0, |acc: Counter, s| {
        let before = s.before.as_ref().is_some_and(|m| m.is_active());
        let after = if s.is_created() && !s.after.is_active() {
            // Opened and closed within the step.
            before
        } else {
            s.after.is_active()
        };
        acc.saturating_add(transition(before, after))
    });

    if operator_delta != row_delta || set_delta != row_delta {
        found.push(Anomaly::blocking(AnomalyKind::MembershipAsymmetry {
            operator_delta,
            set_delta,
            row_delta,
        }));
    }
}

fn check_delegation_symmetry(arena: &StepArena, found: &mut Vec<Anomaly>) {
    let counter_delta = counter_delta(&arena.operators, |o| o.delegator_count);
    let staker_delta = arena.stakers.values().fold(0, |acc: Counter, s| {
        let before = s
            .before
            .as_ref()
            .is_some_and(|st| st.delegated_operator.is_some());
        acc.saturating_add(transition(before, s.after.delegated_operator.is_some()))
    });

    if counter_delta != staker_delta {
        found.push(Anomaly::blocking(AnomalyKind::DelegationAsymmetry {
            counter_delta,
            staker_delta,
        }));
    }
}

fn clamp_counters(arena: &mut StepArena, found: &mut Vec<Anomaly>) {
    for holder in arena.counter_holders() {
        let entity = holder.key();
        for (field, counter) in holder.counters_mut() {
            if *counter < 0 {
                found.push(Anomaly::repaired(AnomalyKind::NegativeCounter {
                    entity: entity.clone(),
                    field,
                    value: *counter,
                }));
                *counter = 0;
            }
        }
    }
}

fn clamp_shares(arena: &mut StepArena, found: &mut Vec<Anomaly>) {
    let mut clamped = BTreeSet::new();
    for staged in arena.strategies.values_mut() {
        let strategy = &mut staged.after;
        if strategy.total_shares.is_negative() {
            found.push(Anomaly::repaired(AnomalyKind::NegativeShares {
                entity: EntityKey::Strategy(strategy.address),
                value: strategy.total_shares,
                clamped: true,
            }));
            strategy.total_shares = I256::ZERO;
            clamped.insert(strategy.address);
        }
    }
    // Share records report the total that is actually stored.
    for record in &mut arena.records {
        if let RecordBody::Share {
            strategy: Some(strategy),
            new_total: Some(total),
            ..
        } = &mut record.body
            && clamped.contains(&*strategy)
            && total.is_negative()
        {
            *total = I256::ZERO;
        }
    }
    // Pod totals follow the beacon chain and may legitimately dip below
    // zero while a slashing is being resolved.
    for staged in arena.pods.values().filter(|s| s.is_dirty()) {
        let pod = &staged.after;
        if pod.total_shares.is_negative() {
            found.push(Anomaly::repaired(AnomalyKind::NegativeShares {
                entity: EntityKey::EigenPod(pod.address),
                value: pod.total_shares,
                clamped: false,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use restaking_store::MemoryStore;
    use restaking_types::{
        B256, DerivedRecord, ListChange, MembershipId, Operator, OperatorSet, OperatorSetMembership,
        ShareKind, Staker, Strategy,
    };

    use super::*;

    fn meta() -> EventMeta {
        EventMeta {
            tx_hash: B256::repeat_byte(0x0C),
            log_index: 1,
            block_number: 120,
            block_timestamp: 1_440,
            contract: Address::ZERO,
        }
    }

    fn op() -> Address {
        Address::repeat_byte(0x01)
    }

    fn set_id() -> OperatorSetId {
        OperatorSetId::new(&Address::repeat_byte(0x02), 0)
    }

    fn membership_record(m: &EventMeta, id: &MembershipId) -> DerivedRecord {
        DerivedRecord::new(
            m,
            vec![
                EntityKey::Operator(op()),
                EntityKey::OperatorSet(set_id()),
                EntityKey::Membership(id.clone()),
            ],
            RecordBody::MembershipChange {
                membership: id.clone(),
                operator: op(),
                operator_set: set_id(),
                change: ListChange::Added,
            },
        )
    }

    /// An arena holding a consistent "operator joins set" step.
    fn joined_arena(m: &EventMeta) -> StepArena {
        let mut arena = StepArena::default();
        let mut operator = Operator::new(op(), 1);
        operator.operator_set_count = 1;
        arena.operators.insert(op(), Staged::created(operator));

        let mut set = OperatorSet::new(set_id(), Address::repeat_byte(0x02), 0, 1, 1);
        set.member_count = 1;
        arena.operator_sets.insert(set_id(), Staged::created(set));

        let id = MembershipId::new(&op(), &set_id(), 1_440);
        arena.memberships.insert(
            id.clone(),
            Staged::created(OperatorSetMembership {
                id: id.clone(),
                operator: op(),
                operator_set: set_id(),
                joined_at: 1_440,
                joined_at_block: 120,
                join_record: m.record_id(),
                left_at: None,
                left_at_block: None,
                leave_record: None,
            }),
        );
        arena.records.push(membership_record(m, &id));
        arena
    }

    #[test]
    fn consistent_step_has_no_anomalies() {
        let store = MemoryStore::new();
        let m = meta();
        let mut arena = joined_arena(&m);
        let found = inspect(&mut arena, &store, &m, GuardPolicy::default());
        assert_eq!(found.ok(), Some(Vec::new()));
    }

    #[test]
    fn one_sided_membership_change_is_blocking() {
        let store = MemoryStore::new();
        let m = meta();
        let mut arena = joined_arena(&m);
        if let Some(set) = arena.operator_sets.get_mut(&set_id()) {
            set.after.member_count = 0;
        }
        let found = inspect(&mut arena, &store, &m, GuardPolicy::default()).unwrap_or_default();
        assert!(found.iter().any(|a| a.is_blocking()
            && matches!(a.kind, AnomalyKind::MembershipAsymmetry { set_delta: 0, row_delta: 1, .. })));
    }

    #[test]
    fn negative_counter_is_clamped() {
        let store = MemoryStore::new();
        let m = meta();
        let mut arena = StepArena::default();
        let mut staker = Staker::new(Address::repeat_byte(0x0A), 1);
        staker.withdrawal_count = -1;
        arena.stakers.insert(staker.address, Staged::created(staker));

        let found = inspect(&mut arena, &store, &m, GuardPolicy::default()).unwrap_or_default();
        assert_eq!(found.len(), 1);
        assert!(found.iter().all(|a| !a.is_blocking()));
        assert_eq!(
            arena
                .stakers
                .get(&Address::repeat_byte(0x0A))
                .map(|s| s.after.withdrawal_count),
            Some(0)
        );
    }

    #[test]
    fn negative_strategy_shares_are_clamped() {
        let store = MemoryStore::new();
        let m = meta();
        let mut arena = StepArena::default();
        let mut strategy = Strategy::new(Address::repeat_byte(0x05), 1);
        strategy.total_shares = I256::MINUS_ONE;
        arena.strategies.insert(strategy.address, Staged::created(strategy));

        let found = inspect(&mut arena, &store, &m, GuardPolicy::default()).unwrap_or_default();
        assert!(matches!(
            found.first().map(|a| &a.kind),
            Some(AnomalyKind::NegativeShares { clamped: true, .. })
        ));
        assert_eq!(
            arena
                .strategies
                .get(&Address::repeat_byte(0x05))
                .map(|s| s.after.total_shares),
            Some(I256::ZERO)
        );
    }

    #[test]
    fn clamped_strategy_rewrites_share_record_total() {
        let store = MemoryStore::new();
        let m = meta();
        let mut arena = StepArena::default();
        let address = Address::repeat_byte(0x05);
        let mut strategy = Strategy::new(address, 1);
        let minus_forty = I256::try_from(-40_i64).unwrap_or(I256::MINUS_ONE);
        strategy.total_shares = minus_forty;
        arena.strategies.insert(address, Staged::created(strategy));
        arena.records.push(DerivedRecord::new(
            &m,
            vec![EntityKey::Strategy(address)],
            RecordBody::Share {
                kind: ShareKind::OperatorDecreased,
                operator: None,
                staker: None,
                strategy: Some(address),
                pod: None,
                delta: minus_forty,
                new_total: Some(minus_forty),
            },
        ));

        let found = inspect(&mut arena, &store, &m, GuardPolicy::default()).unwrap_or_default();
        assert_eq!(found.len(), 1);
        assert!(matches!(
            arena.records.first().map(|r| &r.body),
            Some(RecordBody::Share { delta, new_total: Some(total), .. })
                if *delta == minus_forty && *total == I256::ZERO
        ));
    }

    #[test]
    fn link_outside_step_is_dangling() {
        let store = MemoryStore::new();
        let m = meta();
        let mut arena = StepArena::default();
        arena.records.push(DerivedRecord::new(
            &m,
            vec![EntityKey::Avs(Address::repeat_byte(0x02))],
            RecordBody::DistributionRoot {
                change: restaking_types::DistributionRootChange::Disabled,
                root_index: 0,
                root: None,
                rewards_calculation_end_timestamp: None,
                activated_at: None,
            },
        ));
        let found = inspect(&mut arena, &store, &m, GuardPolicy::default()).unwrap_or_default();
        assert!(matches!(
            found.first(),
            Some(a) if a.is_blocking() && matches!(a.kind, AnomalyKind::DanglingReference { .. })
        ));
    }

    #[test]
    fn duplicate_record_id_in_step_is_an_error() {
        let store = MemoryStore::new();
        let m = meta();
        let mut arena = joined_arena(&m);
        let id = MembershipId::new(&op(), &set_id(), 1_440);
        arena.records.push(membership_record(&m, &id));
        let result = inspect(&mut arena, &store, &m, GuardPolicy::default());
        assert!(matches!(result, Err(EngineError::RecordCollision { .. })));
    }

    #[test]
    fn delegation_without_counter_is_blocking() {
        let store = MemoryStore::new();
        let m = meta();
        let mut arena = StepArena::default();
        let mut staker = Staker::new(Address::repeat_byte(0x0A), 1);
        staker.delegated_operator = Some(op());
        arena.stakers.insert(staker.address, Staged::created(staker));

        let found = inspect(&mut arena, &store, &m, GuardPolicy::default()).unwrap_or_default();
        assert!(found.iter().any(|a| matches!(
            a.kind,
            AnomalyKind::DelegationAsymmetry { counter_delta: 0, staker_delta: 1 }
        )));
    }
}
