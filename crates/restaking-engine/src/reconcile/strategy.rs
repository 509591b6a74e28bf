//! Deposits, deposit whitelist and burn/redistribution reconcilers.
//!
//! Strategies are weak references: nothing here ever skips.

use restaking_store::StoreError;
use restaking_types::events::{
    BurnOrRedistributableSharesChanged, BurnableEthSharesIncreased, BurnableSharesDecreased, Deposit,
    DepositScalingFactorUpdated, StrategyWhitelistChanged,
};
use restaking_types::{EntityKey, ListChange, ProtocolSetting, RecordBody, ResolutionKind, ShareKind};

use super::{Context, Outcome, increment, signed};

/// `Deposit`: weak-creates the staker and the strategy.
pub fn deposit(cx: &mut Context<'_>, ev: &Deposit) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let delta = signed(ev.shares);

    cx.resolver.get_or_create_staker(ev.staker, ts)?.last_activity_at = ts;
    let strategy = cx.resolver.get_or_create_strategy(ev.strategy, ts)?;
    increment(&mut strategy.total_deposits);
    strategy.total_shares = strategy.total_shares.saturating_add(delta);
    strategy.first_deposit_at.get_or_insert(ts);
    strategy.last_activity_at = ts;
    let new_total = strategy.total_shares;

    cx.record(
        vec![EntityKey::Staker(ev.staker), EntityKey::Strategy(ev.strategy)],
        RecordBody::Share {
            kind: ShareKind::Deposit,
            operator: None,
            staker: Some(ev.staker),
            strategy: Some(ev.strategy),
            pod: None,
            delta,
            new_total: Some(new_total),
        },
    );
    Ok(Outcome::Applied)
}

/// `StrategyAddedToDepositWhitelist` / `StrategyRemovedFromDepositWhitelist`.
pub fn whitelist_changed(
    cx: &mut Context<'_>,
    ev: &StrategyWhitelistChanged,
    change: ListChange,
) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    if change == ListChange::Removed && !cx.resolver.exists(&EntityKey::Strategy(ev.strategy))? {
        tracing::warn!(
            event_id = %cx.event_id(),
            strategy = %ev.strategy,
            "Whitelist removal for a strategy never seen before"
        );
    }

    let strategy = cx.resolver.get_or_create_strategy(ev.strategy, ts)?;
    match change {
        ListChange::Added => {
            strategy.is_whitelisted = true;
            strategy.whitelisted_at = Some(ts);
        }
        ListChange::Removed => strategy.is_whitelisted = false,
    }
    strategy.last_activity_at = ts;

    cx.record(
        vec![EntityKey::Strategy(ev.strategy)],
        RecordBody::StrategyWhitelist {
            strategy: ev.strategy,
            change,
        },
    );
    Ok(Outcome::Applied)
}

/// `DepositScalingFactorUpdated`.
pub fn deposit_scaling_factor_updated(
    cx: &mut Context<'_>,
    ev: &DepositScalingFactorUpdated,
) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    cx.resolver.get_or_create_staker(ev.staker, ts)?.last_activity_at = ts;
    cx.resolver.get_or_create_strategy(ev.strategy, ts)?.last_activity_at = ts;

    cx.record(
        vec![EntityKey::Staker(ev.staker), EntityKey::Strategy(ev.strategy)],
        RecordBody::Configuration {
            setting: ProtocolSetting::DepositScalingFactor {
                staker: ev.staker,
                strategy: ev.strategy,
                factor: ev.new_deposit_scaling_factor,
            },
        },
    );
    Ok(Outcome::Applied)
}

/// `BurnOrRedistributableSharesIncreased` / `...Decreased`.
///
/// The set is linked when it is known; the shares belong to the strategy
/// either way.
pub fn burn_or_redistributable_changed(
    cx: &mut Context<'_>,
    ev: &BurnOrRedistributableSharesChanged,
    kind: ResolutionKind,
) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let set_id = ev.operator_set.key();

    cx.resolver.get_or_create_strategy(ev.strategy, ts)?.last_activity_at = ts;
    let mut links = vec![EntityKey::Strategy(ev.strategy)];
    if let Some(set) = cx.resolver.operator_set(&set_id)? {
        set.last_activity_at = ts;
        links.push(EntityKey::OperatorSet(set_id.clone()));
    }

    cx.record(
        links,
        RecordBody::ShareResolution {
            kind,
            operator_set: Some(set_id),
            strategy: Some(ev.strategy),
            shares: ev.shares,
        },
    );
    Ok(Outcome::Applied)
}

/// `BurnableSharesDecreased`.
pub fn burnable_shares_decreased(cx: &mut Context<'_>, ev: &BurnableSharesDecreased) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    cx.resolver.get_or_create_strategy(ev.strategy, ts)?.last_activity_at = ts;

    cx.record(
        vec![EntityKey::Strategy(ev.strategy)],
        RecordBody::ShareResolution {
            kind: ResolutionKind::BurnableDecreased,
            operator_set: None,
            strategy: Some(ev.strategy),
            shares: ev.shares,
        },
    );
    Ok(Outcome::Applied)
}

/// `BurnableETHSharesIncreased`.
pub fn burnable_eth_shares_increased(
    cx: &mut Context<'_>,
    ev: &BurnableEthSharesIncreased,
) -> Result<Outcome, StoreError> {
    cx.record(
        Vec::new(),
        RecordBody::ShareResolution {
            kind: ResolutionKind::BurnableEthIncreased,
            operator_set: None,
            strategy: None,
            shares: ev.shares,
        },
    );
    Ok(Outcome::Applied)
}
