//! Operator and pod share accounting.
//!
//! Pod shares arrive in two shapes: a relative delta (`PodSharesUpdated`)
//! and an absolute total (`NewTotalShares`). Both append a `Share` record
//! with the derived delta, so `delta` always means "what changed" and
//! `new_total` always means "where it ended up", whichever shape arrived.

use restaking_store::StoreError;
use restaking_types::events::{NewTotalShares, OperatorSharesChanged, PodSharesUpdated};
use restaking_types::{Address, EntityKey, I256, RecordBody, ShareKind};

use super::{Context, Outcome, Severity, SkipReason, require, signed, warn_negative_delta};

/// `OperatorSharesIncreased` / `OperatorSharesDecreased`: requires the
/// operator, weak-creates the staker and strategy.
pub fn operator_shares_changed(
    cx: &mut Context<'_>,
    ev: &OperatorSharesChanged,
    kind: ShareKind,
) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    require!(cx, Severity::Warning, [EntityKey::Operator(ev.operator)]);

    let delta = match kind {
        ShareKind::OperatorDecreased => signed(ev.shares).saturating_neg(),
        _ => signed(ev.shares),
    };

    if let Some(op) = cx.resolver.operator(ev.operator)? {
        op.touch(ts);
    }
    cx.resolver.get_or_create_staker(ev.staker, ts)?.last_activity_at = ts;
    let strategy = cx.resolver.get_or_create_strategy(ev.strategy, ts)?;
    strategy.total_shares = strategy.total_shares.saturating_add(delta);
    strategy.last_activity_at = ts;
    let new_total = strategy.total_shares;

    warn_negative_delta(cx, &EntityKey::Strategy(ev.strategy), delta);

    cx.record(
        vec![
            EntityKey::Operator(ev.operator),
            EntityKey::Staker(ev.staker),
            EntityKey::Strategy(ev.strategy),
        ],
        RecordBody::Share {
            kind,
            operator: Some(ev.operator),
            staker: Some(ev.staker),
            strategy: Some(ev.strategy),
            pod: None,
            delta,
            new_total: Some(new_total),
        },
    );
    Ok(Outcome::Applied)
}

/// `PodSharesUpdated`: requires the owner's pod.
pub fn pod_shares_updated(cx: &mut Context<'_>, ev: &PodSharesUpdated) -> Result<Outcome, StoreError> {
    apply_pod_shares(cx, ev.pod_owner, ShareKind::PodDelta, |_| ev.shares_delta)
}

/// `NewTotalShares`: requires the owner's pod; the delta is taken against
/// the current total before it is overwritten.
pub fn new_total_shares(cx: &mut Context<'_>, ev: &NewTotalShares) -> Result<Outcome, StoreError> {
    apply_pod_shares(cx, ev.pod_owner, ShareKind::PodNewTotal, |current| {
        ev.new_total_shares.saturating_sub(current)
    })
}

fn apply_pod_shares(
    cx: &mut Context<'_>,
    owner: Address,
    kind: ShareKind,
    delta_from: impl FnOnce(I256) -> I256,
) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let Some(pod) = cx.resolver.pod_of_owner(owner)? else {
        tracing::warn!(event_id = %cx.event_id(), owner = %owner, "Pod share update for owner without a pod");
        return Ok(Outcome::Skipped(SkipReason::NoPod { owner }));
    };

    let delta = delta_from(pod.total_shares);
    pod.total_shares = pod.total_shares.saturating_add(delta);
    pod.last_activity_at = ts;
    let (pod_address, new_total) = (pod.address, pod.total_shares);

    cx.resolver.get_or_create_staker(owner, ts)?.last_activity_at = ts;
    warn_negative_delta(cx, &EntityKey::EigenPod(pod_address), delta);

    cx.record(
        vec![EntityKey::EigenPod(pod_address), EntityKey::Staker(owner)],
        RecordBody::Share {
            kind,
            operator: None,
            staker: Some(owner),
            strategy: None,
            pod: Some(pod_address),
            delta,
            new_total: Some(new_total),
        },
    );
    Ok(Outcome::Applied)
}
