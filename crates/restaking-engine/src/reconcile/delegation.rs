//! Delegation reconcilers.
//!
//! `Staker.delegated_operator` is the only delegation state; every
//! transition moves it, bumps `Staker.delegation_change_count` and moves the
//! target operator's `delegator_count` by one. The guard checks that the sum
//! of `delegator_count` movements in a step matches the stakers that became
//! delegated minus those that stopped being delegated.

use restaking_store::StoreError;
use restaking_types::events::DelegationChanged;
use restaking_types::{DelegationId, DelegationType, EntityKey, RecordBody};

use super::{Context, Outcome, Severity, SkipReason, decrement, increment, require};

/// `StakerDelegated`: requires the operator, weak-creates the staker.
///
/// A staker already delegated elsewhere is moved: the previous operator
/// loses the delegator before the new one gains it.
pub fn staker_delegated(cx: &mut Context<'_>, ev: &DelegationChanged) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    require!(cx, Severity::Warning, [EntityKey::Operator(ev.operator)]);

    let staker = cx.resolver.get_or_create_staker(ev.staker, ts)?;
    let previous = staker.delegated_operator;
    if previous == Some(ev.operator) {
        return Ok(Outcome::Skipped(SkipReason::AlreadyDelegated {
            staker: ev.staker,
            operator: ev.operator,
        }));
    }
    staker.delegated_operator = Some(ev.operator);
    staker.delegated_at = Some(ts);
    increment(&mut staker.delegation_change_count);
    staker.last_activity_at = ts;

    let mut links = vec![EntityKey::Staker(ev.staker), EntityKey::Operator(ev.operator)];
    if let Some(prev) = previous {
        tracing::warn!(
            event_id = %cx.event_id(),
            staker = %ev.staker,
            previous_operator = %prev,
            operator = %ev.operator,
            "Staker delegated while still delegated; moving delegation"
        );
        if let Some(op) = cx.resolver.operator(prev)? {
            decrement(&mut op.delegator_count);
            op.touch(ts);
            links.push(EntityKey::Operator(prev));
        }
    }

    if let Some(op) = cx.resolver.operator(ev.operator)? {
        increment(&mut op.delegator_count);
        op.touch(ts);
    }

    cx.record(
        links,
        RecordBody::Delegation {
            relationship: DelegationId::new(&ev.staker, &ev.operator, ts),
            staker: ev.staker,
            operator: ev.operator,
            delegation_type: DelegationType::Delegated,
            previous_operator: previous,
        },
    );
    Ok(Outcome::Applied)
}

/// `StakerUndelegated` / `StakerForceUndelegated`: requires the staker and
/// the operator.
pub fn staker_undelegated(
    cx: &mut Context<'_>,
    ev: &DelegationChanged,
    delegation_type: DelegationType,
) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let event_id = cx.event_id();
    require!(
        cx,
        Severity::Warning,
        [EntityKey::Staker(ev.staker), EntityKey::Operator(ev.operator)]
    );

    let Some(staker) = cx.resolver.staker(ev.staker)? else {
        return Ok(Outcome::Skipped(SkipReason::MissingParent {
            key: EntityKey::Staker(ev.staker),
            severity: Severity::Warning,
        }));
    };
    let Some(current) = staker.delegated_operator else {
        return Ok(Outcome::Skipped(SkipReason::NotDelegated { staker: ev.staker }));
    };
    if current != ev.operator {
        tracing::warn!(
            event_id = %event_id,
            staker = %ev.staker,
            current_operator = %current,
            operator = %ev.operator,
            "Undelegation names a different operator than the current delegation"
        );
    }
    staker.delegated_operator = None;
    staker.delegated_at = None;
    increment(&mut staker.delegation_change_count);
    staker.last_activity_at = ts;

    if let Some(op) = cx.resolver.operator(ev.operator)? {
        decrement(&mut op.delegator_count);
        op.touch(ts);
    }

    cx.record(
        vec![EntityKey::Staker(ev.staker), EntityKey::Operator(ev.operator)],
        RecordBody::Delegation {
            relationship: DelegationId::new(&ev.staker, &ev.operator, ts),
            staker: ev.staker,
            operator: ev.operator,
            delegation_type,
            previous_operator: Some(current),
        },
    );
    Ok(Outcome::Applied)
}

#[cfg(test)]
mod tests {
    use restaking_store::MemoryStore;
    use restaking_types::{Address, B256, EventMeta};

    use super::*;
    use crate::resolver::Resolver;

    fn meta() -> EventMeta {
        EventMeta {
            tx_hash: B256::repeat_byte(0x05),
            log_index: 3,
            block_number: 50,
            block_timestamp: 600,
            contract: Address::ZERO,
        }
    }

    fn delegation(operator: u8) -> DelegationChanged {
        DelegationChanged {
            staker: Address::repeat_byte(0x0A),
            operator: Address::repeat_byte(operator),
        }
    }

    #[test]
    fn delegate_then_force_undelegate() {
        let store = MemoryStore::new();
        let m = meta();
        let mut cx = Context::new(&m, Resolver::new(&store));
        let _ = cx.resolver.get_or_create_operator(Address::repeat_byte(0x01), 1);

        assert_eq!(staker_delegated(&mut cx, &delegation(0x01)).ok(), Some(Outcome::Applied));
        assert_eq!(
            staker_undelegated(&mut cx, &delegation(0x01), DelegationType::ForceUndelegated).ok(),
            Some(Outcome::Applied)
        );

        let arena = cx.resolver.into_arena();
        let staker = arena.stakers.get(&Address::repeat_byte(0x0A)).map(|s| s.after.clone());
        assert_eq!(staker.as_ref().and_then(|s| s.delegated_operator), None);
        assert_eq!(staker.map(|s| s.delegation_change_count), Some(2));
        assert_eq!(
            arena
                .operators
                .get(&Address::repeat_byte(0x01))
                .map(|s| s.after.delegator_count),
            Some(0)
        );
        let kinds: Vec<_> = arena
            .records
            .iter()
            .filter_map(|r| match &r.body {
                RecordBody::Delegation { delegation_type, .. } => Some(*delegation_type),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![DelegationType::Delegated, DelegationType::ForceUndelegated]);
    }

    #[test]
    fn redelegation_moves_the_delegator() {
        let store = MemoryStore::new();
        let m = meta();
        let mut cx = Context::new(&m, Resolver::new(&store));
        let _ = cx.resolver.get_or_create_operator(Address::repeat_byte(0x01), 1);
        let _ = cx.resolver.get_or_create_operator(Address::repeat_byte(0x02), 1);

        let _ = staker_delegated(&mut cx, &delegation(0x01));
        assert!(matches!(
            staker_delegated(&mut cx, &delegation(0x01)),
            Ok(Outcome::Skipped(SkipReason::AlreadyDelegated { .. }))
        ));
        assert_eq!(staker_delegated(&mut cx, &delegation(0x02)).ok(), Some(Outcome::Applied));

        let arena = cx.resolver.into_arena();
        let count = |b: u8| {
            arena
                .operators
                .get(&Address::repeat_byte(b))
                .map(|s| s.after.delegator_count)
        };
        assert_eq!(count(0x01), Some(0));
        assert_eq!(count(0x02), Some(1));
    }

    #[test]
    fn undelegating_an_undelegated_staker_is_skipped() {
        let store = MemoryStore::new();
        let m = meta();
        let mut cx = Context::new(&m, Resolver::new(&store));
        let _ = cx.resolver.get_or_create_operator(Address::repeat_byte(0x01), 1);
        let _ = cx.resolver.get_or_create_staker(Address::repeat_byte(0x0A), 1);

        assert!(matches!(
            staker_undelegated(&mut cx, &delegation(0x01), DelegationType::Undelegated),
            Ok(Outcome::Skipped(SkipReason::NotDelegated { .. }))
        ));
    }
}
