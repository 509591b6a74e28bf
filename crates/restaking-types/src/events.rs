//! Decoded protocol events.
//!
//! A [`ProtocolEvent`] is one decoded log: the position metadata in
//! [`EventMeta`] plus a typed [`EventPayload`]. Payloads are a closed
//! tagged union keyed by the on-chain event name in a `type` field; any
//! name the index does not know decodes as [`EventPayload::Unknown`].
//!
//! Field names follow the contract ABI (`camelCase`). Unsigned amounts are
//! [`U256`], signed deltas [`I256`]; both accept decimal or `0x` hex
//! strings on the wire.

use alloy_primitives::{Address, B256, I256, U256};
use serde::{Deserialize, Serialize};

use crate::ids::{OperatorSetId, RecordId};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Position of a log in the chain, ordered by block then log index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPosition {
    /// Block containing the log.
    pub block_number: u64,
    /// Index of the log within the block.
    pub log_index: u64,
}

impl core::fmt::Display for EventPosition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

/// Where and when a log was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    /// Hash of the emitting transaction.
    pub tx_hash: B256,
    /// Index of the log within its block.
    pub log_index: u64,
    /// Block number.
    pub block_number: u64,
    /// Block timestamp in seconds.
    pub block_timestamp: u64,
    /// Emitting contract.
    pub contract: Address,
}

impl EventMeta {
    /// The chain position of this log.
    pub const fn position(&self) -> EventPosition {
        EventPosition {
            block_number: self.block_number,
            log_index: self.log_index,
        }
    }

    /// The `<txHash>-<logIndex>` identity of this log.
    pub fn record_id(&self) -> RecordId {
        RecordId::new(&self.tx_hash, self.log_index)
    }
}

/// One decoded log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolEvent {
    /// Position metadata.
    pub meta: EventMeta,
    /// Typed payload.
    pub payload: EventPayload,
}

impl ProtocolEvent {
    /// The kind tag of the payload.
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

// ---------------------------------------------------------------------------
// Shared payload pieces
// ---------------------------------------------------------------------------

/// An operator set as it appears in event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSetRef {
    /// Owning AVS.
    pub avs: Address,
    /// Set index within the AVS.
    pub id: u32,
}

impl OperatorSetRef {
    /// The composite id of the referenced set.
    pub fn key(&self) -> OperatorSetId {
        OperatorSetId::new(&self.avs, self.id)
    }
}

/// A strategy weight inside a rewards submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyMultiplier {
    /// Weighted strategy.
    pub strategy: Address,
    /// Weight multiplier.
    pub multiplier: U256,
}

/// A per-operator amount inside an operator-directed rewards submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorReward {
    /// Rewarded operator.
    pub operator: Address,
    /// Token amount.
    pub amount: U256,
}

/// A queued withdrawal as carried by `SlashingWithdrawalQueued`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedWithdrawal {
    /// Staker whose shares are withdrawn.
    pub staker: Address,
    /// Operator the staker was delegated to.
    pub delegated_to: Address,
    /// Address allowed to complete the withdrawal.
    pub withdrawer: Address,
    /// Staker withdrawal nonce.
    pub nonce: U256,
    /// Block the withdrawal was queued in.
    pub start_block: u64,
    /// Strategies withdrawn from.
    pub strategies: Vec<Address>,
    /// Scaled shares per strategy.
    pub scaled_shares: Vec<U256>,
}

/// A token-amount rewards submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsSubmission {
    /// Strategy weights.
    pub strategies_and_multipliers: Vec<StrategyMultiplier>,
    /// Reward token.
    pub token: Address,
    /// Total amount.
    pub amount: U256,
    /// Start of the rewards window.
    pub start_timestamp: u64,
    /// Length of the rewards window in seconds.
    pub duration: u64,
}

/// A rewards submission that names per-operator amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorDirectedSubmission {
    /// Strategy weights.
    pub strategies_and_multipliers: Vec<StrategyMultiplier>,
    /// Reward token.
    pub token: Address,
    /// Amount per operator.
    pub operator_rewards: Vec<OperatorReward>,
    /// Start of the rewards window.
    pub start_timestamp: u64,
    /// Length of the rewards window in seconds.
    pub duration: u64,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

impl OperatorDirectedSubmission {
    /// Sum of all operator amounts, saturating at [`U256::MAX`].
    pub fn total_amount(&self) -> U256 {
        self.operator_rewards
            .iter()
            .fold(U256::ZERO, |acc, r| acc.saturating_add(r.amount))
    }
}

// ---------------------------------------------------------------------------
// Payloads: operator and AVS directory
// ---------------------------------------------------------------------------

/// An operator registered itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorRegistered {
    /// Registered operator.
    pub operator: Address,
    /// Initial delegation approver.
    pub delegation_approver: Address,
}

/// An operator announced new metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorMetadataUriUpdated {
    /// Announcing operator.
    pub operator: Address,
    /// New metadata URI.
    #[serde(rename = "metadataURI")]
    pub metadata_uri: String,
}

/// An operator changed its delegation approver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationApproverUpdated {
    /// Operator.
    pub operator: Address,
    /// New approver.
    pub new_delegation_approver: Address,
}

/// An operator's registration status with an AVS changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorAvsRegistrationStatusUpdated {
    /// Operator.
    pub operator: Address,
    /// AVS.
    pub avs: Address,
    /// `1` when registered, anything else when unregistered.
    pub status: u8,
}

/// An AVS announced new metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvsMetadataUriUpdated {
    /// Announcing AVS.
    pub avs: Address,
    /// New metadata URI.
    #[serde(rename = "metadataURI")]
    pub metadata_uri: String,
}

/// An AVS configured its registrar contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvsRegistrarSet {
    /// AVS.
    pub avs: Address,
    /// Registrar contract.
    pub registrar: Address,
}

// ---------------------------------------------------------------------------
// Payloads: operator sets and allocation
// ---------------------------------------------------------------------------

/// A new operator set was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSetCreated {
    /// The new set.
    pub operator_set: OperatorSetRef,
}

/// An operator joined or left an operator set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSetMembershipChanged {
    /// Operator.
    pub operator: Address,
    /// Set.
    pub operator_set: OperatorSetRef,
}

/// A strategy was added to or removed from an operator set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSetStrategyChanged {
    /// Set.
    pub operator_set: OperatorSetRef,
    /// Strategy.
    pub strategy: Address,
}

/// An operator set configured its redistribution recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedistributionAddressSet {
    /// Set.
    pub operator_set: OperatorSetRef,
    /// Recipient of redistributed funds.
    pub redistribution_recipient: Address,
}

/// An operator was slashed by an operator set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSlashed {
    /// Slashed operator.
    pub operator: Address,
    /// Slashing set.
    pub operator_set: OperatorSetRef,
    /// Strategies slashed.
    pub strategies: Vec<Address>,
    /// Proportion slashed per strategy, in WAD.
    pub wad_slashed: Vec<U256>,
    /// Free-form reason.
    #[serde(default)]
    pub description: String,
}

/// An operator changed its allocation to a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationUpdated {
    /// Operator.
    pub operator: Address,
    /// Target set.
    pub operator_set: OperatorSetRef,
    /// Strategy allocated.
    pub strategy: Address,
    /// New magnitude.
    pub magnitude: U256,
    /// Block at which the allocation takes effect.
    pub effect_block: u64,
}

/// An operator set its allocation delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationDelaySet {
    /// Operator.
    pub operator: Address,
    /// Delay in blocks.
    pub delay: u32,
    /// Block at which the delay takes effect.
    pub effect_block: u64,
}

/// An operator's encumbered magnitude changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncumberedMagnitudeUpdated {
    /// Operator.
    pub operator: Address,
    /// Strategy.
    pub strategy: Address,
    /// New encumbered magnitude.
    pub encumbered_magnitude: U256,
}

/// An operator's maximum magnitude changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxMagnitudeUpdated {
    /// Operator.
    pub operator: Address,
    /// Strategy.
    pub strategy: Address,
    /// New maximum magnitude.
    pub max_magnitude: U256,
}

// ---------------------------------------------------------------------------
// Payloads: delegation and shares
// ---------------------------------------------------------------------------

/// A staker's delegation changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationChanged {
    /// Staker.
    pub staker: Address,
    /// Operator delegated to or away from.
    pub operator: Address,
}

/// Operator shares moved for one staker and strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSharesChanged {
    /// Operator.
    pub operator: Address,
    /// Staker whose shares moved.
    pub staker: Address,
    /// Strategy.
    pub strategy: Address,
    /// Magnitude of the change.
    pub shares: U256,
}

/// Operator shares were burned by a slashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSharesSlashed {
    /// Operator.
    pub operator: Address,
    /// Strategy.
    pub strategy: Address,
    /// Shares removed.
    pub total_slashed_shares: U256,
}

/// A withdrawal entered the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlashingWithdrawalQueued {
    /// Withdrawal root.
    pub withdrawal_root: B256,
    /// Withdrawal details.
    pub withdrawal: QueuedWithdrawal,
    /// Shares withdrawn per strategy after slashing.
    pub shares_to_withdraw: Vec<U256>,
}

/// A queued withdrawal was completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlashingWithdrawalCompleted {
    /// Withdrawal root.
    pub withdrawal_root: B256,
}

/// A staker's deposit scaling factor changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositScalingFactorUpdated {
    /// Staker.
    pub staker: Address,
    /// Strategy.
    pub strategy: Address,
    /// New factor.
    pub new_deposit_scaling_factor: U256,
}

// ---------------------------------------------------------------------------
// Payloads: strategies
// ---------------------------------------------------------------------------

/// A staker deposited into a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// Depositor.
    pub staker: Address,
    /// Strategy.
    pub strategy: Address,
    /// Shares minted.
    pub shares: U256,
}

/// A strategy was added to or removed from the deposit whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyWhitelistChanged {
    /// Strategy.
    pub strategy: Address,
}

/// Slashed shares pending burn or redistribution moved for a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnOrRedistributableSharesChanged {
    /// Set whose slashing produced the shares.
    pub operator_set: OperatorSetRef,
    /// Strategy.
    pub strategy: Address,
    /// Shares moved.
    pub shares: U256,
}

/// Burnable shares of a strategy were burned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnableSharesDecreased {
    /// Strategy.
    pub strategy: Address,
    /// Shares burned.
    pub shares: U256,
}

// ---------------------------------------------------------------------------
// Payloads: pods and beacon chain
// ---------------------------------------------------------------------------

/// A pod was deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodDeployed {
    /// Pod contract.
    pub eigen_pod: Address,
    /// Owning staker.
    pub pod_owner: Address,
}

/// ETH was deposited to the beacon chain through a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconChainEthDeposited {
    /// Pod owner.
    pub pod_owner: Address,
    /// Amount deposited in wei.
    pub amount: U256,
}

/// A pod owner's shares moved by a signed delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSharesUpdated {
    /// Pod owner.
    pub pod_owner: Address,
    /// Signed change.
    pub shares_delta: I256,
}

/// A pod owner's shares were set to an absolute total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTotalShares {
    /// Pod owner.
    pub pod_owner: Address,
    /// New total.
    pub new_total_shares: I256,
}

/// A beacon-chain ETH withdrawal completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconChainEthWithdrawalCompleted {
    /// Pod owner.
    pub pod_owner: Address,
    /// Shares withdrawn.
    pub shares: U256,
    /// Withdrawal nonce.
    pub nonce: U256,
    /// Operator delegated to at withdrawal.
    pub delegated_address: Address,
    /// Withdrawal recipient.
    pub withdrawer: Address,
    /// Withdrawal root.
    pub withdrawal_root: B256,
}

/// A staker's beacon-chain slashing factor decreased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconChainSlashingFactorDecreased {
    /// Staker.
    pub staker: Address,
    /// Factor before.
    pub prev_beacon_chain_slashing_factor: u64,
    /// Factor after.
    pub new_beacon_chain_slashing_factor: u64,
}

/// Burnable beacon-chain ETH shares increased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnableEthSharesIncreased {
    /// Shares added.
    pub shares: U256,
}

// ---------------------------------------------------------------------------
// Payloads: rewards and commission
// ---------------------------------------------------------------------------

/// An AVS funded a rewards submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvsRewardsSubmissionCreated {
    /// Funding AVS.
    pub avs: Address,
    /// Submission nonce.
    pub submission_nonce: U256,
    /// Submission hash.
    pub rewards_submission_hash: B256,
    /// Submission.
    pub rewards_submission: RewardsSubmission,
}

/// A protocol-wide rewards submission was funded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsSubmissionForAllCreated {
    /// Funding caller.
    pub submitter: Address,
    /// Submission nonce.
    pub submission_nonce: U256,
    /// Submission hash.
    pub rewards_submission_hash: B256,
    /// Submission.
    pub rewards_submission: RewardsSubmission,
}

/// A rewards submission for all earners was funded by a token hopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsSubmissionForAllEarnersCreated {
    /// Funding hopper.
    pub token_hopper: Address,
    /// Submission nonce.
    pub submission_nonce: U256,
    /// Submission hash.
    pub rewards_submission_hash: B256,
    /// Submission.
    pub rewards_submission: RewardsSubmission,
}

/// An AVS funded an operator-directed rewards submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorDirectedAvsRewardsSubmissionCreated {
    /// Funding caller.
    pub caller: Address,
    /// AVS rewarded on behalf of.
    pub avs: Address,
    /// Submission hash.
    pub operator_directed_rewards_submission_hash: B256,
    /// Submission nonce.
    pub submission_nonce: U256,
    /// Submission.
    pub operator_directed_rewards_submission: OperatorDirectedSubmission,
}

/// An operator set funded an operator-directed rewards submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorDirectedOperatorSetRewardsSubmissionCreated {
    /// Funding caller.
    pub caller: Address,
    /// Submission hash.
    pub operator_directed_rewards_submission_hash: B256,
    /// Funding set.
    pub operator_set: OperatorSetRef,
    /// Submission nonce.
    pub submission_nonce: U256,
    /// Submission.
    pub operator_directed_rewards_submission: OperatorDirectedSubmission,
}

/// An operator set its commission for a specific AVS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorAvsSplitBipsSet {
    /// Caller.
    pub caller: Address,
    /// Operator.
    pub operator: Address,
    /// AVS the split applies to.
    pub avs: Address,
    /// Activation timestamp.
    pub activated_at: u64,
    /// Split before, in bips.
    #[serde(rename = "oldOperatorAVSSplitBips")]
    pub old_split_bips: u16,
    /// Split after, in bips.
    #[serde(rename = "newOperatorAVSSplitBips")]
    pub new_split_bips: u16,
}

/// An operator set its programmatic-incentive commission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorPiSplitBipsSet {
    /// Caller.
    pub caller: Address,
    /// Operator.
    pub operator: Address,
    /// Activation timestamp.
    pub activated_at: u64,
    /// Split before, in bips.
    #[serde(rename = "oldOperatorPISplitBips")]
    pub old_split_bips: u16,
    /// Split after, in bips.
    #[serde(rename = "newOperatorPISplitBips")]
    pub new_split_bips: u16,
}

/// An operator set its commission for a specific operator set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSetSplitBipsSet {
    /// Caller.
    pub caller: Address,
    /// Operator.
    pub operator: Address,
    /// Set the split applies to.
    pub operator_set: OperatorSetRef,
    /// Activation timestamp.
    pub activated_at: u64,
    /// Split before, in bips.
    #[serde(rename = "oldOperatorSetSplitBips")]
    pub old_split_bips: u16,
    /// Split after, in bips.
    #[serde(rename = "newOperatorSetSplitBips")]
    pub new_split_bips: u16,
}

/// A rewards distribution root was posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRootSubmitted {
    /// Root index.
    pub root_index: u32,
    /// Merkle root.
    pub root: B256,
    /// End of the rewards calculation window.
    pub rewards_calculation_end_timestamp: u64,
    /// Activation timestamp.
    pub activated_at: u64,
}

/// A rewards distribution root was disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRootDisabled {
    /// Root index.
    pub root_index: u32,
}

/// An earner claimed rewards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsClaimed {
    /// Root claimed against.
    pub root: B256,
    /// Earner.
    pub earner: Address,
    /// Claimer.
    pub claimer: Address,
    /// Recipient.
    pub recipient: Address,
    /// Token.
    pub token: Address,
    /// Amount claimed.
    pub claimed_amount: U256,
}

/// The rewards activation delay changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationDelaySet {
    /// Delay before.
    pub old_activation_delay: u32,
    /// Delay after.
    pub new_activation_delay: u32,
}

/// The default operator commission changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultOperatorSplitBipsSet {
    /// Split before, in bips.
    pub old_default_operator_split_bips: u16,
    /// Split after, in bips.
    pub new_default_operator_split_bips: u16,
}

// ---------------------------------------------------------------------------
// Tagged union
// ---------------------------------------------------------------------------

/// Generates [`EventPayload`], [`EventKind`] and the mapping between them.
macro_rules! define_events {
    (
        $(
            $(#[doc = $doc:literal])*
            $wire:literal => $variant:ident($payload:ty),
        )*
    ) => {
        /// A decoded event payload, tagged by on-chain event name.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(tag = "type")]
        #[allow(clippy::large_enum_variant)]
        pub enum EventPayload {
            $(
                $(#[doc = $doc])*
                #[serde(rename = $wire)]
                $variant($payload),
            )*
            /// An event name the index does not recognize.
            #[serde(other)]
            Unknown,
        }

        /// The kind of an event, without its payload.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum EventKind {
            $(
                $(#[doc = $doc])*
                #[serde(rename = $wire)]
                $variant,
            )*
            /// An event name the index does not recognize.
            Unknown,
        }

        impl EventPayload {
            /// The kind tag of this payload.
            pub const fn kind(&self) -> EventKind {
                match self {
                    $(Self::$variant(_) => EventKind::$variant,)*
                    Self::Unknown => EventKind::Unknown,
                }
            }
        }

        impl EventKind {
            /// Every known kind, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];

            /// The on-chain event name.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)*
                    Self::Unknown => "Unknown",
                }
            }
        }
    };
}

define_events! {
    /// `DelegationManager`: operator registration.
    "OperatorRegistered" => OperatorRegistered(OperatorRegistered),
    /// `DelegationManager`: operator metadata.
    "OperatorMetadataURIUpdated" => OperatorMetadataUriUpdated(OperatorMetadataUriUpdated),
    /// `DelegationManager`: approver change.
    "DelegationApproverUpdated" => DelegationApproverUpdated(DelegationApproverUpdated),
    /// `AVSDirectory`: registration status.
    "OperatorAVSRegistrationStatusUpdated" => OperatorAvsRegistrationStatusUpdated(OperatorAvsRegistrationStatusUpdated),
    /// `AVSDirectory` / `AllocationManager`: AVS metadata.
    "AVSMetadataURIUpdated" => AvsMetadataUriUpdated(AvsMetadataUriUpdated),
    /// `AllocationManager`: registrar configuration.
    "AVSRegistrarSet" => AvsRegistrarSet(AvsRegistrarSet),
    /// `AllocationManager`: set creation.
    "OperatorSetCreated" => OperatorSetCreated(OperatorSetCreated),
    /// `AllocationManager`: operator joins a set.
    "OperatorAddedToOperatorSet" => OperatorAddedToOperatorSet(OperatorSetMembershipChanged),
    /// `AllocationManager`: operator leaves a set.
    "OperatorRemovedFromOperatorSet" => OperatorRemovedFromOperatorSet(OperatorSetMembershipChanged),
    /// `AllocationManager`: strategy joins a set.
    "StrategyAddedToOperatorSet" => StrategyAddedToOperatorSet(OperatorSetStrategyChanged),
    /// `AllocationManager`: strategy leaves a set.
    "StrategyRemovedFromOperatorSet" => StrategyRemovedFromOperatorSet(OperatorSetStrategyChanged),
    /// `AllocationManager`: redistribution recipient.
    "RedistributionAddressSet" => RedistributionAddressSet(RedistributionAddressSet),
    /// `AllocationManager`: slashing.
    "OperatorSlashed" => OperatorSlashed(OperatorSlashed),
    /// `AllocationManager`: allocation change.
    "AllocationUpdated" => AllocationUpdated(AllocationUpdated),
    /// `AllocationManager`: allocation delay.
    "AllocationDelaySet" => AllocationDelaySet(AllocationDelaySet),
    /// `AllocationManager`: encumbered magnitude.
    "EncumberedMagnitudeUpdated" => EncumberedMagnitudeUpdated(EncumberedMagnitudeUpdated),
    /// `AllocationManager`: maximum magnitude.
    "MaxMagnitudeUpdated" => MaxMagnitudeUpdated(MaxMagnitudeUpdated),
    /// `DelegationManager`: delegation.
    "StakerDelegated" => StakerDelegated(DelegationChanged),
    /// `DelegationManager`: voluntary undelegation.
    "StakerUndelegated" => StakerUndelegated(DelegationChanged),
    /// `DelegationManager`: operator-forced undelegation.
    "StakerForceUndelegated" => StakerForceUndelegated(DelegationChanged),
    /// `DelegationManager`: operator shares up.
    "OperatorSharesIncreased" => OperatorSharesIncreased(OperatorSharesChanged),
    /// `DelegationManager`: operator shares down.
    "OperatorSharesDecreased" => OperatorSharesDecreased(OperatorSharesChanged),
    /// `DelegationManager`: operator shares slashed.
    "OperatorSharesSlashed" => OperatorSharesSlashed(OperatorSharesSlashed),
    /// `DelegationManager`: withdrawal queued.
    "SlashingWithdrawalQueued" => SlashingWithdrawalQueued(SlashingWithdrawalQueued),
    /// `DelegationManager`: withdrawal completed.
    "SlashingWithdrawalCompleted" => SlashingWithdrawalCompleted(SlashingWithdrawalCompleted),
    /// `DelegationManager`: deposit scaling factor.
    "DepositScalingFactorUpdated" => DepositScalingFactorUpdated(DepositScalingFactorUpdated),
    /// `StrategyManager`: deposit.
    "Deposit" => Deposit(Deposit),
    /// `StrategyManager`: whitelist addition.
    "StrategyAddedToDepositWhitelist" => StrategyAddedToDepositWhitelist(StrategyWhitelistChanged),
    /// `StrategyManager`: whitelist removal.
    "StrategyRemovedFromDepositWhitelist" => StrategyRemovedFromDepositWhitelist(StrategyWhitelistChanged),
    /// `StrategyManager`: pending slashed shares up.
    "BurnOrRedistributableSharesIncreased" => BurnOrRedistributableSharesIncreased(BurnOrRedistributableSharesChanged),
    /// `StrategyManager`: pending slashed shares down.
    "BurnOrRedistributableSharesDecreased" => BurnOrRedistributableSharesDecreased(BurnOrRedistributableSharesChanged),
    /// `StrategyManager`: burn.
    "BurnableSharesDecreased" => BurnableSharesDecreased(BurnableSharesDecreased),
    /// `EigenPodManager`: pod deployment.
    "PodDeployed" => PodDeployed(PodDeployed),
    /// `EigenPodManager`: beacon-chain deposit.
    "BeaconChainETHDeposited" => BeaconChainEthDeposited(BeaconChainEthDeposited),
    /// `EigenPodManager`: pod share delta.
    "PodSharesUpdated" => PodSharesUpdated(PodSharesUpdated),
    /// `EigenPodManager`: pod share total.
    "NewTotalShares" => NewTotalShares(NewTotalShares),
    /// `EigenPodManager`: beacon-chain withdrawal.
    "BeaconChainETHWithdrawalCompleted" => BeaconChainEthWithdrawalCompleted(BeaconChainEthWithdrawalCompleted),
    /// `EigenPodManager`: beacon-chain slashing factor.
    "BeaconChainSlashingFactorDecreased" => BeaconChainSlashingFactorDecreased(BeaconChainSlashingFactorDecreased),
    /// `EigenPodManager`: burnable ETH shares.
    "BurnableETHSharesIncreased" => BurnableEthSharesIncreased(BurnableEthSharesIncreased),
    /// `RewardsCoordinator`: AVS submission.
    "AVSRewardsSubmissionCreated" => AvsRewardsSubmissionCreated(AvsRewardsSubmissionCreated),
    /// `RewardsCoordinator`: submission for all stakers.
    "RewardsSubmissionForAllCreated" => RewardsSubmissionForAllCreated(RewardsSubmissionForAllCreated),
    /// `RewardsCoordinator`: submission for all earners.
    "RewardsSubmissionForAllEarnersCreated" => RewardsSubmissionForAllEarnersCreated(RewardsSubmissionForAllEarnersCreated),
    /// `RewardsCoordinator`: operator-directed AVS submission.
    "OperatorDirectedAVSRewardsSubmissionCreated" => OperatorDirectedAvsRewardsSubmissionCreated(OperatorDirectedAvsRewardsSubmissionCreated),
    /// `RewardsCoordinator`: operator-directed set submission.
    "OperatorDirectedOperatorSetRewardsSubmissionCreated" => OperatorDirectedOperatorSetRewardsSubmissionCreated(OperatorDirectedOperatorSetRewardsSubmissionCreated),
    /// `RewardsCoordinator`: per-AVS commission.
    "OperatorAVSSplitBipsSet" => OperatorAvsSplitBipsSet(OperatorAvsSplitBipsSet),
    /// `RewardsCoordinator`: programmatic-incentive commission.
    "OperatorPISplitBipsSet" => OperatorPiSplitBipsSet(OperatorPiSplitBipsSet),
    /// `RewardsCoordinator`: per-set commission.
    "OperatorSetSplitBipsSet" => OperatorSetSplitBipsSet(OperatorSetSplitBipsSet),
    /// `RewardsCoordinator`: root posted.
    "DistributionRootSubmitted" => DistributionRootSubmitted(DistributionRootSubmitted),
    /// `RewardsCoordinator`: root disabled.
    "DistributionRootDisabled" => DistributionRootDisabled(DistributionRootDisabled),
    /// `RewardsCoordinator`: claim.
    "RewardsClaimed" => RewardsClaimed(RewardsClaimed),
    /// `RewardsCoordinator`: activation delay.
    "ActivationDelaySet" => ActivationDelaySet(ActivationDelaySet),
    /// `RewardsCoordinator`: default commission.
    "DefaultOperatorSplitBipsSet" => DefaultOperatorSplitBipsSet(DefaultOperatorSplitBipsSet),
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> Option<ProtocolEvent> {
        serde_json::from_str(json).ok()
    }

    const META: &str = r#""meta":{"txHash":"0x1111111111111111111111111111111111111111111111111111111111111111","logIndex":3,"blockNumber":10,"blockTimestamp":1700000000,"contract":"0x0000000000000000000000000000000000000000"}"#;

    #[test]
    fn decodes_tagged_payload() {
        let json = format!(
            r#"{{{META},"payload":{{"type":"OperatorRegistered","operator":"0x0101010101010101010101010101010101010101","delegationApprover":"0x0000000000000000000000000000000000000000"}}}}"#
        );
        let event = decode(&json);
        assert!(event.is_some());
        let Some(event) = event else { return };
        assert_eq!(event.kind(), EventKind::OperatorRegistered);
        assert_eq!(event.meta.position(), EventPosition { block_number: 10, log_index: 3 });
    }

    #[test]
    fn unknown_type_decodes_as_unknown() {
        let json = format!(r#"{{{META},"payload":{{"type":"SomethingNew"}}}}"#);
        let event = decode(&json);
        assert_eq!(event.map(|e| e.kind()), Some(EventKind::Unknown));
    }

    #[test]
    fn acronym_fields_use_abi_names() {
        let json = format!(
            r#"{{{META},"payload":{{"type":"OperatorMetadataURIUpdated","operator":"0x0101010101010101010101010101010101010101","metadataURI":"ipfs://x"}}}}"#
        );
        let event = decode(&json);
        let uri = match event.map(|e| e.payload) {
            Some(EventPayload::OperatorMetadataUriUpdated(p)) => Some(p.metadata_uri),
            _ => None,
        };
        assert_eq!(uri.as_deref(), Some("ipfs://x"));
    }

    #[test]
    fn signed_delta_accepts_negative_decimal() {
        let json = format!(
            r#"{{{META},"payload":{{"type":"PodSharesUpdated","podOwner":"0x0101010101010101010101010101010101010101","sharesDelta":"-5"}}}}"#
        );
        let delta = match decode(&json).map(|e| e.payload) {
            Some(EventPayload::PodSharesUpdated(p)) => Some(p.shares_delta),
            _ => None,
        };
        assert_eq!(delta, I256::try_from(-5_i64).ok());
    }

    #[test]
    fn positions_order_by_block_then_log() {
        let a = EventPosition { block_number: 1, log_index: 9 };
        let b = EventPosition { block_number: 2, log_index: 0 };
        let c = EventPosition { block_number: 2, log_index: 1 };
        assert!(a < b && b < c);
    }

    #[test]
    fn kind_names_round_trip_through_display() {
        assert_eq!(EventKind::BeaconChainEthDeposited.to_string(), "BeaconChainETHDeposited");
        assert_eq!(EventKind::ALL.len(), 52);
    }

    #[test]
    fn operator_directed_total_sums_rewards() {
        let sub = OperatorDirectedSubmission {
            strategies_and_multipliers: Vec::new(),
            token: Address::ZERO,
            operator_rewards: vec![
                OperatorReward { operator: Address::repeat_byte(1), amount: U256::from(10_u64) },
                OperatorReward { operator: Address::repeat_byte(2), amount: U256::from(32_u64) },
            ],
            start_timestamp: 0,
            duration: 0,
            description: String::new(),
        };
        assert_eq!(sub.total_amount(), U256::from(42_u64));
    }
}
