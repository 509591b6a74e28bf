//! Allocation and magnitude reconcilers.
//!
//! Allocations take effect at a later block. The engine records the effect
//! block but never schedules or enforces it.

use restaking_store::StoreError;
use restaking_types::events::{
    AllocationDelaySet, AllocationUpdated, EncumberedMagnitudeUpdated, MaxMagnitudeUpdated,
};
use restaking_types::{Address, AllocationSetting, EntityKey, RecordBody};

use super::{Context, Outcome, Severity, increment, require};

/// `AllocationUpdated`: requires the operator and the set.
pub fn allocation_updated(cx: &mut Context<'_>, ev: &AllocationUpdated) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let set_id = ev.operator_set.key();
    require!(
        cx,
        Severity::Warning,
        [EntityKey::Operator(ev.operator), EntityKey::OperatorSet(set_id.clone())]
    );

    if let Some(op) = cx.resolver.operator(ev.operator)? {
        op.touch(ts);
    }
    if let Some(set) = cx.resolver.operator_set(&set_id)? {
        increment(&mut set.allocation_count);
        set.last_activity_at = ts;
    }
    let strategy = cx.resolver.get_or_create_strategy(ev.strategy, ts)?;
    strategy.last_activity_at = ts;

    cx.record(
        vec![
            EntityKey::Operator(ev.operator),
            EntityKey::OperatorSet(set_id.clone()),
            EntityKey::Strategy(ev.strategy),
        ],
        RecordBody::Allocation {
            operator: ev.operator,
            setting: AllocationSetting::Allocation {
                operator_set: set_id,
                strategy: ev.strategy,
                magnitude: ev.magnitude,
                effect_block: ev.effect_block,
            },
        },
    );
    Ok(Outcome::Applied)
}

/// `AllocationDelaySet`: requires the operator.
pub fn allocation_delay_set(cx: &mut Context<'_>, ev: &AllocationDelaySet) -> Result<Outcome, StoreError> {
    configure(
        cx,
        ev.operator,
        None,
        AllocationSetting::Delay {
            delay: ev.delay,
            effect_block: ev.effect_block,
        },
    )
}

/// `EncumberedMagnitudeUpdated`: requires the operator.
pub fn encumbered_magnitude_updated(
    cx: &mut Context<'_>,
    ev: &EncumberedMagnitudeUpdated,
) -> Result<Outcome, StoreError> {
    configure(
        cx,
        ev.operator,
        Some(ev.strategy),
        AllocationSetting::EncumberedMagnitude {
            strategy: ev.strategy,
            magnitude: ev.encumbered_magnitude,
        },
    )
}

/// `MaxMagnitudeUpdated`: requires the operator.
pub fn max_magnitude_updated(cx: &mut Context<'_>, ev: &MaxMagnitudeUpdated) -> Result<Outcome, StoreError> {
    configure(
        cx,
        ev.operator,
        Some(ev.strategy),
        AllocationSetting::MaxMagnitude {
            strategy: ev.strategy,
            magnitude: ev.max_magnitude,
        },
    )
}

/// Touch the operator, weak-create the strategy and append the setting.
fn configure(
    cx: &mut Context<'_>,
    operator: Address,
    strategy: Option<Address>,
    setting: AllocationSetting,
) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    require!(cx, Severity::Warning, [EntityKey::Operator(operator)]);

    if let Some(op) = cx.resolver.operator(operator)? {
        op.touch(ts);
    }
    let mut links = vec![EntityKey::Operator(operator)];
    if let Some(address) = strategy {
        cx.resolver.get_or_create_strategy(address, ts)?.last_activity_at = ts;
        links.push(EntityKey::Strategy(address));
    }

    cx.record(links, RecordBody::Allocation { operator, setting });
    Ok(Outcome::Applied)
}

#[cfg(test)]
mod tests {
    use restaking_store::MemoryStore;
    use restaking_types::{B256, EventMeta, OperatorSet, OperatorSetRef, U256};

    use super::*;
    use crate::resolver::Resolver;

    fn meta() -> EventMeta {
        EventMeta {
            tx_hash: B256::repeat_byte(0x04),
            log_index: 2,
            block_number: 40,
            block_timestamp: 480,
            contract: Address::ZERO,
        }
    }

    #[test]
    fn allocation_counts_on_set_and_creates_strategy() {
        let store = MemoryStore::new();
        let m = meta();
        let mut cx = Context::new(&m, Resolver::new(&store));
        let op = Address::repeat_byte(0x01);
        let set_ref = OperatorSetRef { avs: Address::repeat_byte(0x02), id: 1 };
        let _ = cx.resolver.get_or_create_operator(op, 1);
        let _ = cx
            .resolver
            .create_operator_set(OperatorSet::new(set_ref.key(), set_ref.avs, 1, 1, 1));

        let outcome = allocation_updated(
            &mut cx,
            &AllocationUpdated {
                operator: op,
                operator_set: set_ref,
                strategy: Address::repeat_byte(0x05),
                magnitude: U256::from(5_000_u64),
                effect_block: 140,
            },
        );
        assert_eq!(outcome.ok(), Some(Outcome::Applied));

        let arena = cx.resolver.into_arena();
        assert_eq!(
            arena.operator_sets.get(&set_ref.key()).map(|s| s.after.allocation_count),
            Some(1)
        );
        assert!(arena.strategies.contains_key(&Address::repeat_byte(0x05)));
        assert_eq!(arena.records.len(), 1);
    }

    #[test]
    fn magnitude_update_for_unknown_operator_is_skipped() {
        let store = MemoryStore::new();
        let m = meta();
        let mut cx = Context::new(&m, Resolver::new(&store));
        let outcome = max_magnitude_updated(
            &mut cx,
            &MaxMagnitudeUpdated {
                operator: Address::repeat_byte(0x01),
                strategy: Address::repeat_byte(0x05),
                max_magnitude: U256::from(1_u64),
            },
        );
        assert!(matches!(outcome, Ok(Outcome::Skipped(_))));
        let arena = cx.resolver.into_arena();
        assert!(arena.strategies.is_empty());
        assert!(arena.records.is_empty());
    }
}
