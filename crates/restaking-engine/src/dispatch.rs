//! Event dispatch table.
//!
//! A static mapping from [`EventPayload`] variant to reconciler. The table
//! holds no state; [`dispatch`] is a single `match`, so adding a variant to
//! the payload union without routing it is a compile error.

use restaking_store::StoreError;
use restaking_types::{DelegationType, EventKind, EventPayload, ListChange, ResolutionKind, ShareKind};

use crate::reconcile::{
    Context, Outcome, allocation, delegation, operator, operator_set, pod, rewards, shares, slashing, strategy,
    withdrawal,
};

/// Reconciler domain an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Domain {
    /// Operator registration, metadata and the AVS directory.
    Operator,
    /// Set lifecycle and membership.
    OperatorSet,
    /// Operator and beacon-chain slashing.
    Slashing,
    /// Allocations and magnitudes.
    Allocation,
    /// Staker delegation.
    Delegation,
    /// Operator and pod share accounting.
    Shares,
    /// Deposits, whitelist, burn and redistribution.
    Strategy,
    /// Pod deployment and beacon-chain deposits/withdrawals.
    Pod,
    /// Queued withdrawals.
    Withdrawal,
    /// Rewards, commission and distribution roots.
    Rewards,
}

impl Domain {
    /// Lowercase name used in log fields.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::OperatorSet => "operator_set",
            Self::Slashing => "slashing",
            Self::Allocation => "allocation",
            Self::Delegation => "delegation",
            Self::Shares => "shares",
            Self::Strategy => "strategy",
            Self::Pod => "pod",
            Self::Withdrawal => "withdrawal",
            Self::Rewards => "rewards",
        }
    }
}

/// The domain that handles `kind`, or `None` when nothing does.
pub const fn domain_of(kind: EventKind) -> Option<Domain> {
    use EventKind as K;
    Some(match kind {
        K::OperatorRegistered
        | K::OperatorMetadataUriUpdated
        | K::DelegationApproverUpdated
        | K::OperatorAvsRegistrationStatusUpdated
        | K::AvsMetadataUriUpdated
        | K::AvsRegistrarSet => Domain::Operator,
        K::OperatorSetCreated
        | K::OperatorAddedToOperatorSet
        | K::OperatorRemovedFromOperatorSet
        | K::StrategyAddedToOperatorSet
        | K::StrategyRemovedFromOperatorSet
        | K::RedistributionAddressSet => Domain::OperatorSet,
        K::OperatorSlashed | K::OperatorSharesSlashed | K::BeaconChainSlashingFactorDecreased => Domain::Slashing,
        K::AllocationUpdated | K::AllocationDelaySet | K::EncumberedMagnitudeUpdated | K::MaxMagnitudeUpdated => {
            Domain::Allocation
        }
        K::StakerDelegated | K::StakerUndelegated | K::StakerForceUndelegated => Domain::Delegation,
        K::OperatorSharesIncreased | K::OperatorSharesDecreased | K::PodSharesUpdated | K::NewTotalShares => {
            Domain::Shares
        }
        K::Deposit
        | K::DepositScalingFactorUpdated
        | K::StrategyAddedToDepositWhitelist
        | K::StrategyRemovedFromDepositWhitelist
        | K::BurnOrRedistributableSharesIncreased
        | K::BurnOrRedistributableSharesDecreased
        | K::BurnableSharesDecreased
        | K::BurnableEthSharesIncreased => Domain::Strategy,
        K::PodDeployed | K::BeaconChainEthDeposited | K::BeaconChainEthWithdrawalCompleted => Domain::Pod,
        K::SlashingWithdrawalQueued | K::SlashingWithdrawalCompleted => Domain::Withdrawal,
        K::AvsRewardsSubmissionCreated
        | K::RewardsSubmissionForAllCreated
        | K::RewardsSubmissionForAllEarnersCreated
        | K::OperatorDirectedAvsRewardsSubmissionCreated
        | K::OperatorDirectedOperatorSetRewardsSubmissionCreated
        | K::OperatorAvsSplitBipsSet
        | K::OperatorPiSplitBipsSet
        | K::OperatorSetSplitBipsSet
        | K::DistributionRootSubmitted
        | K::DistributionRootDisabled
        | K::RewardsClaimed
        | K::ActivationDelaySet
        | K::DefaultOperatorSplitBipsSet => Domain::Rewards,
        K::Unknown => return None,
    })
}

/// Route `payload` to its reconciler.
///
/// Returns `None` for [`EventPayload::Unknown`], which has no reconciler.
pub fn dispatch(cx: &mut Context<'_>, payload: &EventPayload) -> Option<Result<Outcome, StoreError>> {
    use EventPayload as E;
    Some(match payload {
        // Operator
        E::OperatorRegistered(ev) => operator::operator_registered(cx, ev),
        E::OperatorMetadataUriUpdated(ev) => operator::operator_metadata_updated(cx, ev),
        E::DelegationApproverUpdated(ev) => operator::delegation_approver_updated(cx, ev),
        E::OperatorAvsRegistrationStatusUpdated(ev) => operator::registration_status_updated(cx, ev),
        E::AvsMetadataUriUpdated(ev) => operator::avs_metadata_updated(cx, ev),
        E::AvsRegistrarSet(ev) => operator::avs_registrar_set(cx, ev),

        // Operator sets
        E::OperatorSetCreated(ev) => operator_set::operator_set_created(cx, ev),
        E::OperatorAddedToOperatorSet(ev) => operator_set::operator_added(cx, ev),
        E::OperatorRemovedFromOperatorSet(ev) => operator_set::operator_removed(cx, ev),
        E::StrategyAddedToOperatorSet(ev) => operator_set::strategy_changed(cx, ev, ListChange::Added),
        E::StrategyRemovedFromOperatorSet(ev) => operator_set::strategy_changed(cx, ev, ListChange::Removed),
        E::RedistributionAddressSet(ev) => operator_set::redistribution_address_set(cx, ev),

        // Slashing
        E::OperatorSlashed(ev) => slashing::operator_slashed(cx, ev),
        E::OperatorSharesSlashed(ev) => slashing::operator_shares_slashed(cx, ev),
        E::BeaconChainSlashingFactorDecreased(ev) => slashing::beacon_chain_slashing_factor_decreased(cx, ev),

        // Allocation
        E::AllocationUpdated(ev) => allocation::allocation_updated(cx, ev),
        E::AllocationDelaySet(ev) => allocation::allocation_delay_set(cx, ev),
        E::EncumberedMagnitudeUpdated(ev) => allocation::encumbered_magnitude_updated(cx, ev),
        E::MaxMagnitudeUpdated(ev) => allocation::max_magnitude_updated(cx, ev),

        // Delegation
        E::StakerDelegated(ev) => delegation::staker_delegated(cx, ev),
        E::StakerUndelegated(ev) => delegation::staker_undelegated(cx, ev, DelegationType::Undelegated),
        E::StakerForceUndelegated(ev) => delegation::staker_undelegated(cx, ev, DelegationType::ForceUndelegated),

        // Shares
        E::OperatorSharesIncreased(ev) => shares::operator_shares_changed(cx, ev, ShareKind::OperatorIncreased),
        E::OperatorSharesDecreased(ev) => shares::operator_shares_changed(cx, ev, ShareKind::OperatorDecreased),
        E::PodSharesUpdated(ev) => shares::pod_shares_updated(cx, ev),
        E::NewTotalShares(ev) => shares::new_total_shares(cx, ev),

        // Strategy
        E::Deposit(ev) => strategy::deposit(cx, ev),
        E::DepositScalingFactorUpdated(ev) => strategy::deposit_scaling_factor_updated(cx, ev),
        E::StrategyAddedToDepositWhitelist(ev) => strategy::whitelist_changed(cx, ev, ListChange::Added),
        E::StrategyRemovedFromDepositWhitelist(ev) => strategy::whitelist_changed(cx, ev, ListChange::Removed),
        E::BurnOrRedistributableSharesIncreased(ev) => {
            strategy::burn_or_redistributable_changed(cx, ev, ResolutionKind::BurnOrRedistributableIncreased)
        }
        E::BurnOrRedistributableSharesDecreased(ev) => {
            strategy::burn_or_redistributable_changed(cx, ev, ResolutionKind::BurnOrRedistributableDecreased)
        }
        E::BurnableSharesDecreased(ev) => strategy::burnable_shares_decreased(cx, ev),
        E::BurnableEthSharesIncreased(ev) => strategy::burnable_eth_shares_increased(cx, ev),

        // Pods
        E::PodDeployed(ev) => pod::pod_deployed(cx, ev),
        E::BeaconChainEthDeposited(ev) => pod::beacon_chain_eth_deposited(cx, ev),
        E::BeaconChainEthWithdrawalCompleted(ev) => pod::beacon_chain_eth_withdrawal_completed(cx, ev),

        // Withdrawals
        E::SlashingWithdrawalQueued(ev) => withdrawal::withdrawal_queued(cx, ev),
        E::SlashingWithdrawalCompleted(ev) => withdrawal::withdrawal_completed(cx, ev),

        // Rewards
        E::AvsRewardsSubmissionCreated(ev) => rewards::avs_submission(cx, ev),
        E::RewardsSubmissionForAllCreated(ev) => rewards::for_all_submission(cx, ev),
        E::RewardsSubmissionForAllEarnersCreated(ev) => rewards::for_all_earners_submission(cx, ev),
        E::OperatorDirectedAvsRewardsSubmissionCreated(ev) => rewards::operator_directed_avs_submission(cx, ev),
        E::OperatorDirectedOperatorSetRewardsSubmissionCreated(ev) => {
            rewards::operator_directed_set_submission(cx, ev)
        }
        E::OperatorAvsSplitBipsSet(ev) => rewards::operator_avs_split(cx, ev),
        E::OperatorPiSplitBipsSet(ev) => rewards::operator_pi_split(cx, ev),
        E::OperatorSetSplitBipsSet(ev) => rewards::operator_set_split(cx, ev),
        E::DistributionRootSubmitted(ev) => rewards::distribution_root_submitted(cx, ev),
        E::DistributionRootDisabled(ev) => rewards::distribution_root_disabled(cx, ev),
        E::RewardsClaimed(ev) => rewards::rewards_claimed(cx, ev),
        E::ActivationDelaySet(ev) => rewards::activation_delay_set(cx, ev),
        E::DefaultOperatorSplitBipsSet(ev) => rewards::default_operator_split_set(cx, ev),

        E::Unknown => return None,
    })
}
