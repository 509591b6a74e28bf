//! Slashing reconcilers.
//!
//! Slashing is the highest-priority signal the index carries, so a missing
//! parent here is reported at error severity rather than as a warning.

use restaking_store::StoreError;
use restaking_types::events::{BeaconChainSlashingFactorDecreased, OperatorSharesSlashed, OperatorSlashed};
use restaking_types::{EntityKey, RecordBody, ShareKind};

use super::{Context, Outcome, Severity, increment, require, signed};

/// `OperatorSlashed`: requires the operator, the set and its AVS; counts the
/// slashing on all three.
pub fn operator_slashed(cx: &mut Context<'_>, ev: &OperatorSlashed) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let set_id = ev.operator_set.key();
    let avs = ev.operator_set.avs;
    require!(
        cx,
        Severity::Error,
        [
            EntityKey::Operator(ev.operator),
            EntityKey::OperatorSet(set_id.clone()),
            EntityKey::Avs(avs),
        ]
    );

    if let Some(op) = cx.resolver.operator(ev.operator)? {
        increment(&mut op.slashing_event_count);
        op.touch(ts);
    }
    if let Some(set) = cx.resolver.operator_set(&set_id)? {
        increment(&mut set.slashing_event_count);
        set.last_activity_at = ts;
    }
    if let Some(avs) = cx.resolver.avs(avs)? {
        increment(&mut avs.slashing_event_count);
        avs.touch(ts);
    }

    tracing::warn!(
        event_id = %cx.event_id(),
        operator = %ev.operator,
        operator_set = %set_id,
        strategies = ev.strategies.len(),
        "Operator slashed"
    );

    cx.record(
        vec![
            EntityKey::Operator(ev.operator),
            EntityKey::OperatorSet(set_id.clone()),
            EntityKey::Avs(avs),
        ],
        RecordBody::Slashing {
            operator: ev.operator,
            operator_set: set_id,
            avs,
            strategies: ev.strategies.clone(),
            wad_slashed: ev.wad_slashed.clone(),
            description: ev.description.clone(),
        },
    );
    Ok(Outcome::Applied)
}

/// `OperatorSharesSlashed`: requires the operator; burns shares from the
/// strategy total.
pub fn operator_shares_slashed(cx: &mut Context<'_>, ev: &OperatorSharesSlashed) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    require!(cx, Severity::Error, [EntityKey::Operator(ev.operator)]);

    if let Some(op) = cx.resolver.operator(ev.operator)? {
        increment(&mut op.slashing_event_count);
        op.touch(ts);
    }

    let delta = signed(ev.total_slashed_shares).saturating_neg();
    let strategy = cx.resolver.get_or_create_strategy(ev.strategy, ts)?;
    strategy.total_shares = strategy.total_shares.saturating_add(delta);
    strategy.last_activity_at = ts;
    let new_total = strategy.total_shares;

    cx.record(
        vec![EntityKey::Operator(ev.operator), EntityKey::Strategy(ev.strategy)],
        RecordBody::Share {
            kind: ShareKind::OperatorSlashed,
            operator: Some(ev.operator),
            staker: None,
            strategy: Some(ev.strategy),
            pod: None,
            delta,
            new_total: Some(new_total),
        },
    );
    Ok(Outcome::Applied)
}

/// `BeaconChainSlashingFactorDecreased`: weak-creates the staker.
pub fn beacon_chain_slashing_factor_decreased(
    cx: &mut Context<'_>,
    ev: &BeaconChainSlashingFactorDecreased,
) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let staker = cx.resolver.get_or_create_staker(ev.staker, ts)?;
    staker.last_activity_at = ts;

    tracing::error!(
        event_id = %cx.event_id(),
        staker = %ev.staker,
        prev_factor = ev.prev_beacon_chain_slashing_factor,
        new_factor = ev.new_beacon_chain_slashing_factor,
        "Beacon chain slashing factor decreased"
    );

    cx.record(
        vec![EntityKey::Staker(ev.staker)],
        RecordBody::BeaconChainSlashing {
            staker: ev.staker,
            prev_factor: ev.prev_beacon_chain_slashing_factor,
            new_factor: ev.new_beacon_chain_slashing_factor,
        },
    );
    Ok(Outcome::Applied)
}
