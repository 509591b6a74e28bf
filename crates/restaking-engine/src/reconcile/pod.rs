//! Pod deployment and beacon-chain deposit/withdrawal reconcilers.
//!
//! Each owner has at most one pod. Deposits and withdrawals for an owner
//! without a pod are still recorded, with a null pod reference.

use restaking_store::StoreError;
use restaking_types::events::{BeaconChainEthDeposited, BeaconChainEthWithdrawalCompleted, PodDeployed};
use restaking_types::{Address, EigenPod, EntityKey, RecordBody};

use super::{Context, Outcome, SkipReason, increment};

/// `PodDeployed`: weak-creates the owner and creates the pod.
pub fn pod_deployed(cx: &mut Context<'_>, ev: &PodDeployed) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();

    if let Some(existing) = cx.resolver.pod_of_owner(ev.pod_owner)? {
        let existing = existing.address;
        tracing::error!(
            event_id = %cx.event_id(),
            owner = %ev.pod_owner,
            existing_pod = %existing,
            pod = %ev.eigen_pod,
            "Second pod deployed for owner"
        );
        return Ok(Outcome::Skipped(SkipReason::AlreadyExists {
            key: EntityKey::EigenPod(existing),
        }));
    }

    let pod = EigenPod::new(ev.eigen_pod, ev.pod_owner, ts, cx.meta.record_id());
    if !cx.resolver.create_eigen_pod(pod)? {
        return Ok(Outcome::Skipped(SkipReason::AlreadyExists {
            key: EntityKey::EigenPod(ev.eigen_pod),
        }));
    }
    cx.resolver.get_or_create_staker(ev.pod_owner, ts)?.last_activity_at = ts;

    cx.record(
        vec![EntityKey::EigenPod(ev.eigen_pod), EntityKey::Staker(ev.pod_owner)],
        RecordBody::PodDeployment {
            pod: ev.eigen_pod,
            owner: ev.pod_owner,
        },
    );
    Ok(Outcome::Applied)
}

/// `BeaconChainETHDeposited`.
pub fn beacon_chain_eth_deposited(cx: &mut Context<'_>, ev: &BeaconChainEthDeposited) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let pod = touch_pod(cx, ev.pod_owner, |pod| increment(&mut pod.deposit_count))?;
    cx.resolver.get_or_create_staker(ev.pod_owner, ts)?.last_activity_at = ts;

    cx.record(
        links(pod, ev.pod_owner),
        RecordBody::BeaconChainDeposit {
            pod,
            owner: ev.pod_owner,
            amount: ev.amount,
        },
    );
    Ok(Outcome::Applied)
}

/// `BeaconChainETHWithdrawalCompleted`.
pub fn beacon_chain_eth_withdrawal_completed(
    cx: &mut Context<'_>,
    ev: &BeaconChainEthWithdrawalCompleted,
) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let pod = touch_pod(cx, ev.pod_owner, |pod| increment(&mut pod.withdrawal_count))?;
    let staker = cx.resolver.get_or_create_staker(ev.pod_owner, ts)?;
    increment(&mut staker.withdrawal_count);
    staker.last_activity_at = ts;

    cx.record(
        links(pod, ev.pod_owner),
        RecordBody::BeaconChainWithdrawal {
            pod,
            owner: ev.pod_owner,
            shares: ev.shares,
            nonce: ev.nonce,
            delegated_address: ev.delegated_address,
            withdrawer: ev.withdrawer,
            withdrawal_root: ev.withdrawal_root,
        },
    );
    Ok(Outcome::Applied)
}

/// Apply `update` to the owner's pod, if any, returning its address.
fn touch_pod(
    cx: &mut Context<'_>,
    owner: Address,
    update: impl FnOnce(&mut EigenPod),
) -> Result<Option<Address>, StoreError> {
    let ts = cx.timestamp();
    if let Some(pod) = cx.resolver.pod_of_owner(owner)? {
        update(pod);
        pod.last_activity_at = ts;
        return Ok(Some(pod.address));
    }
    tracing::warn!(event_id = %cx.event_id(), owner = %owner, "No pod for owner; recording without pod");
    Ok(None)
}

fn links(pod: Option<Address>, owner: Address) -> Vec<EntityKey> {
    pod.map(EntityKey::EigenPod)
        .into_iter()
        .chain(std::iter::once(EntityKey::Staker(owner)))
        .collect()
}
