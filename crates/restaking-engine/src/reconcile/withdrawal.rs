//! Queued withdrawal reconcilers.

use restaking_store::StoreError;
use restaking_types::events::{SlashingWithdrawalCompleted, SlashingWithdrawalQueued};
use restaking_types::{EntityKey, RecordBody, WithdrawalPhase};

use super::{Context, Outcome, increment};

/// `SlashingWithdrawalQueued`: weak-creates the staker and every listed
/// strategy, and indexes the root so completion can find the staker.
pub fn withdrawal_queued(cx: &mut Context<'_>, ev: &SlashingWithdrawalQueued) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let w = &ev.withdrawal;

    let staker = cx.resolver.get_or_create_staker(w.staker, ts)?;
    increment(&mut staker.withdrawal_count);
    staker.last_activity_at = ts;

    let mut links = vec![EntityKey::Staker(w.staker)];
    if cx.resolver.operator(w.delegated_to)?.is_some() {
        links.push(EntityKey::Operator(w.delegated_to));
    }
    for strategy in &w.strategies {
        cx.resolver.get_or_create_strategy(*strategy, ts)?.last_activity_at = ts;
        let key = EntityKey::Strategy(*strategy);
        if !links.contains(&key) {
            links.push(key);
        }
    }
    cx.resolver.index_withdrawal(ev.withdrawal_root, w.staker);

    cx.record(
        links,
        RecordBody::Withdrawal {
            phase: WithdrawalPhase::Queued,
            withdrawal_root: ev.withdrawal_root,
            staker: Some(w.staker),
            withdrawal: Some(w.clone()),
            shares_to_withdraw: ev.shares_to_withdraw.clone(),
        },
    );
    Ok(Outcome::Applied)
}

/// `SlashingWithdrawalCompleted`: resolves the staker through the queued
/// withdrawal's root when it was seen.
pub fn withdrawal_completed(cx: &mut Context<'_>, ev: &SlashingWithdrawalCompleted) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let staker = cx.resolver.withdrawal_staker(&ev.withdrawal_root)?;

    let mut links = Vec::new();
    match staker {
        Some(address) => {
            if let Some(staker) = cx.resolver.staker(address)? {
                staker.last_activity_at = ts;
                links.push(EntityKey::Staker(address));
            }
        }
        None => tracing::debug!(
            event_id = %cx.event_id(),
            withdrawal_root = %ev.withdrawal_root,
            "Completed withdrawal has no queued record"
        ),
    }

    cx.record(
        links,
        RecordBody::Withdrawal {
            phase: WithdrawalPhase::Completed,
            withdrawal_root: ev.withdrawal_root,
            staker,
            withdrawal: None,
            shares_to_withdraw: Vec::new(),
        },
    );
    Ok(Outcome::Applied)
}

#[cfg(test)]
mod tests {
    use restaking_store::MemoryStore;
    use restaking_types::{Address, B256, EventMeta, QueuedWithdrawal, U256};

    use super::*;
    use crate::resolver::Resolver;

    fn meta() -> EventMeta {
        EventMeta {
            tx_hash: B256::repeat_byte(0x09),
            log_index: 0,
            block_number: 90,
            block_timestamp: 1_080,
            contract: Address::ZERO,
        }
    }

    #[test]
    fn queue_then_complete_resolves_staker() {
        let store = MemoryStore::new();
        let m = meta();
        let mut cx = Context::new(&m, Resolver::new(&store));
        let staker = Address::repeat_byte(0x0A);
        let root = B256::repeat_byte(0x77);
        let strategy = Address::repeat_byte(0x05);

        let queued = SlashingWithdrawalQueued {
            withdrawal_root: root,
            withdrawal: QueuedWithdrawal {
                staker,
                delegated_to: Address::repeat_byte(0x01),
                withdrawer: staker,
                nonce: U256::ZERO,
                start_block: 90,
                strategies: vec![strategy, strategy],
                scaled_shares: vec![U256::from(1_u64), U256::from(2_u64)],
            },
            shares_to_withdraw: vec![U256::from(1_u64), U256::from(2_u64)],
        };
        assert_eq!(withdrawal_queued(&mut cx, &queued).ok(), Some(Outcome::Applied));
        assert_eq!(
            withdrawal_completed(&mut cx, &SlashingWithdrawalCompleted { withdrawal_root: root }).ok(),
            Some(Outcome::Applied)
        );

        let arena = cx.resolver.into_arena();
        // Unknown delegated operator is not linked; the repeated strategy is linked once.
        assert_eq!(
            arena.records.first().map(|r| r.links.clone()),
            Some(vec![EntityKey::Staker(staker), EntityKey::Strategy(strategy)])
        );
        assert!(matches!(
            arena.records.get(1).map(|r| &r.body),
            Some(RecordBody::Withdrawal { phase: WithdrawalPhase::Completed, staker: Some(s), .. }) if *s == staker
        ));
        assert_eq!(arena.stakers.get(&staker).map(|s| s.after.withdrawal_count), Some(1));
    }
}
