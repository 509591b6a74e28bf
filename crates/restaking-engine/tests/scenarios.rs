//! End-to-end reconciliation scenarios driven through the [`Indexer`].
//!
//! Integration tests use expect/unwrap extensively for clarity -- panicking
//! on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::panic,
    clippy::indexing_slicing
)]

use restaking_engine::{AnomalyKind, EngineConfig, EngineError, Indexer, Severity, SkipReason, StepOutcome};
use restaking_store::{EntityStore, MemoryStore};
use restaking_types::events::{
    DelegationChanged, NewTotalShares, OperatorRegistered, OperatorSetCreated, OperatorSetMembershipChanged,
    OperatorSharesChanged, OperatorSlashed, PodDeployed, PodSharesUpdated,
};
use restaking_types::{
    Address, B256, DelegationType, EntityKey, EventMeta, EventPayload, I256, OperatorSetId, OperatorSetRef,
    ProtocolEvent, RecordBody, U256,
};

const OPERATOR: Address = Address::repeat_byte(0x01);
const AVS: Address = Address::repeat_byte(0x02);
const STAKER: Address = Address::repeat_byte(0x0A);
const STRATEGY: Address = Address::repeat_byte(0x05);

/// Builds events at increasing positions within one transaction per block.
struct Chain {
    block: u64,
    log_index: u64,
}

impl Chain {
    fn new() -> Self {
        Self { block: 100, log_index: 0 }
    }

    /// Next event in a new block.
    fn next(&mut self, payload: EventPayload) -> ProtocolEvent {
        self.block = self.block.saturating_add(1);
        self.log_index = 0;
        self.event(payload)
    }

    /// Next event in the current block, sharing its timestamp.
    fn same_block(&mut self, payload: EventPayload) -> ProtocolEvent {
        self.log_index = self.log_index.saturating_add(1);
        self.event(payload)
    }

    fn event(&self, payload: EventPayload) -> ProtocolEvent {
        ProtocolEvent {
            meta: EventMeta {
                tx_hash: B256::left_padding_from(&self.block.to_be_bytes()),
                log_index: self.log_index,
                block_number: self.block,
                block_timestamp: self.block.saturating_mul(12),
                contract: Address::ZERO,
            },
            payload,
        }
    }
}

fn set_ref() -> OperatorSetRef {
    OperatorSetRef { avs: AVS, id: 7 }
}

fn set_id() -> OperatorSetId {
    set_ref().key()
}

fn registered() -> EventPayload {
    EventPayload::OperatorRegistered(OperatorRegistered {
        operator: OPERATOR,
        delegation_approver: Address::ZERO,
    })
}

fn set_created() -> EventPayload {
    EventPayload::OperatorSetCreated(OperatorSetCreated { operator_set: set_ref() })
}

fn membership() -> OperatorSetMembershipChanged {
    OperatorSetMembershipChanged {
        operator: OPERATOR,
        operator_set: set_ref(),
    }
}

fn delegation() -> DelegationChanged {
    DelegationChanged {
        staker: STAKER,
        operator: OPERATOR,
    }
}

fn indexer() -> Indexer<MemoryStore> {
    Indexer::new(MemoryStore::new(), EngineConfig::default())
}

fn apply(indexer: &mut Indexer<MemoryStore>, event: &ProtocolEvent) -> StepOutcome {
    indexer.process(event).expect("event should process")
}

fn assert_applied(outcome: &StepOutcome) {
    assert!(matches!(outcome, StepOutcome::Applied { .. }), "expected Applied, got {outcome:?}");
}

#[test]
fn membership_lifecycle_keeps_counters_symmetric() {
    let mut chain = Chain::new();
    let mut indexer = indexer();

    assert_applied(&apply(&mut indexer, &chain.next(registered())));
    assert_applied(&apply(&mut indexer, &chain.next(set_created())));

    let add = chain.next(EventPayload::OperatorAddedToOperatorSet(membership()));
    assert_applied(&apply(&mut indexer, &add));
    {
        let store = indexer.store();
        assert_eq!(store.operator(&OPERATOR).unwrap().unwrap().operator_set_count, 1);
        assert_eq!(store.operator_set(&set_id()).unwrap().unwrap().member_count, 1);
        let open = store.open_membership(&OPERATOR, &set_id()).unwrap().unwrap();
        assert_eq!(open.join_record, add.meta.record_id());
    }

    // A second add while the row is open is skipped without touching counters.
    let again = apply(&mut indexer, &chain.next(EventPayload::OperatorAddedToOperatorSet(membership())));
    assert!(matches!(again, StepOutcome::Skipped(SkipReason::AlreadyMember { .. })));

    let remove = chain.next(EventPayload::OperatorRemovedFromOperatorSet(membership()));
    assert_applied(&apply(&mut indexer, &remove));

    let store = indexer.store();
    assert_eq!(store.operator(&OPERATOR).unwrap().unwrap().operator_set_count, 0);
    assert_eq!(store.operator_set(&set_id()).unwrap().unwrap().member_count, 0);
    assert!(store.open_membership(&OPERATOR, &set_id()).unwrap().is_none());

    let rows: Vec<_> = store.memberships().collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].leave_record.as_ref(), Some(&remove.meta.record_id()));
    assert_eq!(rows[0].left_at_block, Some(remove.meta.block_number));

    // The removal record links the closed row.
    let record = store.record(&remove.meta.record_id()).unwrap();
    assert!(record.links.contains(&EntityKey::Membership(rows[0].id.clone())));
}

#[test]
fn rejoining_opens_a_fresh_row() {
    let mut chain = Chain::new();
    let mut indexer = indexer();
    for payload in [
        registered(),
        set_created(),
        EventPayload::OperatorAddedToOperatorSet(membership()),
        EventPayload::OperatorRemovedFromOperatorSet(membership()),
        EventPayload::OperatorAddedToOperatorSet(membership()),
    ] {
        assert_applied(&apply(&mut indexer, &chain.next(payload)));
    }

    let store = indexer.store();
    assert_eq!(store.memberships().count(), 2);
    assert_eq!(store.memberships().filter(|m| m.is_active()).count(), 1);
    assert_eq!(store.operator(&OPERATOR).unwrap().unwrap().operator_set_count, 1);
}

#[test]
fn rejoining_within_the_same_block_is_reported() {
    let mut chain = Chain::new();
    let mut indexer = indexer();
    assert_applied(&apply(&mut indexer, &chain.next(registered())));
    assert_applied(&apply(&mut indexer, &chain.next(set_created())));

    let join = chain.next(EventPayload::OperatorAddedToOperatorSet(membership()));
    assert_applied(&apply(&mut indexer, &join));
    let leave = chain.same_block(EventPayload::OperatorRemovedFromOperatorSet(membership()));
    assert_applied(&apply(&mut indexer, &leave));
    let rejoin = chain.same_block(EventPayload::OperatorAddedToOperatorSet(membership()));

    let StepOutcome::Skipped(reason) = apply(&mut indexer, &rejoin) else {
        panic!("a re-join reusing the row id should be skipped");
    };
    assert_eq!(reason.severity(), Severity::Error);
    let SkipReason::MembershipIdTaken {
        existing_record,
        record,
        ..
    } = &reason
    else {
        panic!("unexpected skip reason {reason:?}");
    };
    assert_eq!(existing_record.as_ref(), Some(&join.meta.record_id()));
    assert_eq!(record, &rejoin.meta.record_id());

    // The closed row and its counters are untouched.
    let store = indexer.store();
    assert_eq!(store.memberships().count(), 1);
    assert_eq!(store.operator(&OPERATOR).unwrap().unwrap().operator_set_count, 0);
    assert_eq!(store.operator_set(&set_id()).unwrap().unwrap().member_count, 0);
    assert!(store.record(&rejoin.meta.record_id()).is_none());
    assert_eq!(indexer.stats().skipped, 1);
}

#[test]
fn delegate_then_force_undelegate() {
    let mut chain = Chain::new();
    let mut indexer = indexer();
    assert_applied(&apply(&mut indexer, &chain.next(registered())));

    let delegate = chain.next(EventPayload::StakerDelegated(delegation()));
    assert_applied(&apply(&mut indexer, &delegate));
    assert_eq!(indexer.store().operator(&OPERATOR).unwrap().unwrap().delegator_count, 1);
    assert_eq!(
        indexer.store().staker(&STAKER).unwrap().unwrap().delegated_operator,
        Some(OPERATOR)
    );

    let force = chain.next(EventPayload::StakerForceUndelegated(delegation()));
    assert_applied(&apply(&mut indexer, &force));

    let store = indexer.store();
    assert_eq!(store.operator(&OPERATOR).unwrap().unwrap().delegator_count, 0);
    let staker = store.staker(&STAKER).unwrap().unwrap();
    assert_eq!(staker.delegated_operator, None);
    assert_eq!(staker.delegation_change_count, 2);

    let kinds: Vec<_> = [&delegate, &force]
        .iter()
        .map(|ev| match &store.record(&ev.meta.record_id()).unwrap().body {
            RecordBody::Delegation { delegation_type, .. } => *delegation_type,
            other => panic!("unexpected record body {other:?}"),
        })
        .collect();
    assert_eq!(kinds, vec![DelegationType::Delegated, DelegationType::ForceUndelegated]);
}

#[test]
fn undelegating_twice_skips_the_second() {
    let mut chain = Chain::new();
    let mut indexer = indexer();
    for payload in [
        registered(),
        EventPayload::StakerDelegated(delegation()),
        EventPayload::StakerUndelegated(delegation()),
    ] {
        assert_applied(&apply(&mut indexer, &chain.next(payload)));
    }

    let outcome = apply(&mut indexer, &chain.next(EventPayload::StakerUndelegated(delegation())));
    assert!(matches!(outcome, StepOutcome::Skipped(SkipReason::NotDelegated { .. })));
    assert_eq!(indexer.store().operator(&OPERATOR).unwrap().unwrap().delegator_count, 0);
    assert_eq!(indexer.store().staker(&STAKER).unwrap().unwrap().delegation_change_count, 2);
    assert_eq!(indexer.store().counts().records, 3);
}

#[test]
fn slashing_with_unknown_parents_is_skipped_without_side_effects() {
    let mut chain = Chain::new();
    let mut indexer = indexer();

    let slash = chain.next(EventPayload::OperatorSlashed(OperatorSlashed {
        operator: OPERATOR,
        operator_set: set_ref(),
        strategies: vec![STRATEGY],
        wad_slashed: vec![U256::from(1_u64)],
        description: "missed attestation".to_owned(),
    }));
    let outcome = apply(&mut indexer, &slash);
    assert!(matches!(
        outcome,
        StepOutcome::Skipped(SkipReason::MissingParent { key: EntityKey::Operator(_), .. })
    ));

    let counts = indexer.store().counts();
    assert_eq!(counts.operators, 0);
    assert_eq!(counts.avss, 0);
    assert_eq!(counts.strategies, 0);
    assert_eq!(counts.records, 0);
    assert_eq!(counts.receipts, 0);
    assert_eq!(indexer.store().cursor().unwrap(), None);
}

#[test]
fn replaying_the_stream_is_a_no_op() {
    let mut chain = Chain::new();
    let events: Vec<_> = [
        registered(),
        set_created(),
        EventPayload::OperatorAddedToOperatorSet(membership()),
        EventPayload::StakerDelegated(delegation()),
    ]
    .into_iter()
    .map(|payload| chain.next(payload))
    .collect();

    let mut indexer = indexer();
    for event in &events {
        assert_applied(&apply(&mut indexer, event));
    }
    let before = indexer.store().to_snapshot();

    for event in &events {
        assert_eq!(apply(&mut indexer, event), StepOutcome::Duplicate);
    }
    let after = indexer.store().to_snapshot();

    assert_eq!(before.operators, after.operators);
    assert_eq!(before.operator_sets, after.operator_sets);
    assert_eq!(before.memberships, after.memberships);
    assert_eq!(before.records, after.records);
    assert_eq!(before.cursor, after.cursor);
    assert_eq!(indexer.stats().duplicates, 4);
}

#[test]
fn shares_never_go_negative() {
    let mut chain = Chain::new();
    let mut indexer = indexer();
    assert_applied(&apply(&mut indexer, &chain.next(registered())));

    let decrease = chain.next(EventPayload::OperatorSharesDecreased(OperatorSharesChanged {
        operator: OPERATOR,
        staker: STAKER,
        strategy: STRATEGY,
        shares: U256::from(50_u64),
    }));
    let StepOutcome::Applied { anomalies } = apply(&mut indexer, &decrease) else {
        panic!("decrease should apply with a repaired anomaly");
    };
    assert!(anomalies.iter().any(|a| matches!(
        a.kind,
        AnomalyKind::NegativeShares { clamped: true, .. }
    )));
    assert!(anomalies.iter().all(|a| !a.is_blocking()));

    let strategy = indexer.store().strategy(&STRATEGY).unwrap().unwrap();
    assert_eq!(strategy.total_shares, I256::ZERO);
    assert_eq!(indexer.stats().anomalies, 1);

    // The audit record agrees with the stored total.
    let record = indexer.store().record(&decrease.meta.record_id()).unwrap();
    let RecordBody::Share { delta, new_total, .. } = &record.body else {
        panic!("expected a share record, got {:?}", record.body);
    };
    assert_eq!(*delta, I256::try_from(-50_i64).unwrap());
    assert_eq!(*new_total, Some(strategy.total_shares));
}

#[test]
fn pod_delta_and_absolute_total_agree() {
    let owner = STAKER;
    let pod_address = Address::repeat_byte(0x0E);
    let run = |second: EventPayload| {
        let mut chain = Chain::new();
        let mut indexer = indexer();
        for payload in [
            EventPayload::PodDeployed(PodDeployed {
                eigen_pod: pod_address,
                pod_owner: owner,
            }),
            EventPayload::PodSharesUpdated(PodSharesUpdated {
                pod_owner: owner,
                shares_delta: I256::try_from(100_i64).unwrap(),
            }),
            second,
        ] {
            assert_applied(&apply(&mut indexer, &chain.next(payload)));
        }
        let pod = indexer.store().eigen_pod(&pod_address).unwrap().unwrap();
        let last = indexer.store().records().last().cloned().unwrap();
        (pod.total_shares, last.body)
    };

    let (by_delta, delta_body) = run(EventPayload::PodSharesUpdated(PodSharesUpdated {
        pod_owner: owner,
        shares_delta: I256::try_from(-36_i64).unwrap(),
    }));
    let (by_total, total_body) = run(EventPayload::NewTotalShares(NewTotalShares {
        pod_owner: owner,
        new_total_shares: I256::try_from(64_i64).unwrap(),
    }));

    assert_eq!(by_delta, by_total);
    for body in [delta_body, total_body] {
        let RecordBody::Share { delta, new_total, .. } = body else {
            panic!("expected a share record");
        };
        assert_eq!(delta, I256::try_from(-36_i64).unwrap());
        assert_eq!(new_total, Some(I256::try_from(64_i64).unwrap()));
    }
}

#[test]
fn strict_ordering_rejects_and_lenient_ordering_flags() {
    let mut chain = Chain::new();
    let first = chain.next(registered());
    let later = chain.next(set_created());

    let mut strict = Indexer::new(MemoryStore::new(), EngineConfig { strict_ordering: true });
    assert_applied(&apply(&mut strict, &later));
    let StepOutcome::Rejected { anomalies } = apply(&mut strict, &first) else {
        panic!("older event should be rejected");
    };
    assert!(anomalies.iter().any(|a| a.is_blocking() && matches!(a.kind, AnomalyKind::OutOfOrder { .. })));
    assert!(strict.store().operator(&OPERATOR).unwrap().is_none());

    let mut lenient = indexer();
    assert_applied(&apply(&mut lenient, &later));
    let StepOutcome::Applied { anomalies } = apply(&mut lenient, &first) else {
        panic!("older event should apply when ordering is lenient");
    };
    assert!(anomalies.iter().any(|a| matches!(a.kind, AnomalyKind::OutOfOrder { .. })));
    assert!(lenient.store().operator(&OPERATOR).unwrap().is_some());
}

#[test]
fn record_without_receipt_is_a_collision() {
    let mut chain = Chain::new();
    let event = chain.next(registered());

    let mut indexer = indexer();
    assert_applied(&apply(&mut indexer, &event));

    let mut snapshot = indexer.into_store().to_snapshot();
    snapshot.receipts.clear();
    let store = MemoryStore::from_snapshot(snapshot).expect("snapshot should restore");

    let mut indexer = Indexer::new(store, EngineConfig::default());
    let err = indexer.process(&event).unwrap_err();
    assert!(matches!(err, EngineError::RecordCollision { id } if id == event.meta.record_id()));
    assert_eq!(indexer.store().counts().receipts, 0);
}

#[test]
fn unknown_events_are_dropped() {
    let mut chain = Chain::new();
    let mut indexer = indexer();
    assert_eq!(apply(&mut indexer, &chain.next(EventPayload::Unknown)), StepOutcome::Dropped);
    assert_eq!(indexer.store().counts().receipts, 0);
    assert_eq!(indexer.stats().dropped, 1);
}

#[test]
fn wire_events_decode_and_apply() {
    let lines = [
        r#"{"meta":{"txHash":"0x00000000000000000000000000000000000000000000000000000000000000aa","logIndex":0,"blockNumber":5,"blockTimestamp":60,"contract":"0x0000000000000000000000000000000000000000"},"payload":{"type":"OperatorRegistered","operator":"0x0101010101010101010101010101010101010101","delegationApprover":"0x0000000000000000000000000000000000000000"}}"#,
        r#"{"meta":{"txHash":"0x00000000000000000000000000000000000000000000000000000000000000aa","logIndex":1,"blockNumber":5,"blockTimestamp":60,"contract":"0x0000000000000000000000000000000000000000"},"payload":{"type":"OperatorSharesIncreased","operator":"0x0101010101010101010101010101010101010101","staker":"0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a","strategy":"0x0505050505050505050505050505050505050505","shares":"1000"}}"#,
    ];

    let mut indexer = indexer();
    for line in lines {
        let event: ProtocolEvent = serde_json::from_str(line).expect("event should decode");
        assert_applied(&apply(&mut indexer, &event));
    }

    let strategy = indexer.store().strategy(&STRATEGY).unwrap().unwrap();
    assert_eq!(strategy.total_shares, I256::try_from(1_000_i64).unwrap());
    assert!(indexer.store().staker(&STAKER).unwrap().is_some());
    assert_eq!(indexer.stats().records, 2);
}
