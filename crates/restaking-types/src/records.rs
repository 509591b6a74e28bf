//! Append-only derived records.
//!
//! Every applied event leaves at most one [`DerivedRecord`] behind, keyed by
//! the same `<txHash>-<logIndex>` id as the event itself. A record is never
//! mutated after it is written. It carries the full event payload in its
//! [`RecordBody`] plus the foreign keys the engine resolved for it in
//! [`DerivedRecord::links`]; every link names an entity that existed when
//! the record was committed.
//!
//! [`EventReceipt`]s are the idempotence ledger: one per applied event,
//! written in the same atomic commit as the record.

use alloy_primitives::{Address, B256, I256, U256};
use serde::{Deserialize, Serialize};

use crate::events::{EventKind, EventMeta, EventPosition, OperatorReward, QueuedWithdrawal, StrategyMultiplier};
use crate::ids::{DelegationId, EntityKey, MembershipId, OperatorSetId, RecordId, RegistrationId};

/// Provenance shared by every derived record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    /// `<txHash>-<logIndex>` id.
    pub id: RecordId,
    /// Emitting transaction.
    pub tx_hash: B256,
    /// Log index within the block.
    pub log_index: u64,
    /// Block number.
    pub block_number: u64,
    /// Block timestamp in seconds.
    pub block_timestamp: u64,
    /// Emitting contract.
    pub contract: Address,
}

impl RecordHeader {
    /// Copy provenance from an event's metadata.
    pub fn from_meta(meta: &EventMeta) -> Self {
        Self {
            id: meta.record_id(),
            tx_hash: meta.tx_hash,
            log_index: meta.log_index,
            block_number: meta.block_number,
            block_timestamp: meta.block_timestamp,
            contract: meta.contract,
        }
    }
}

/// An immutable record of one applied event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedRecord {
    /// Provenance.
    pub header: RecordHeader,
    /// Resolved foreign keys.
    pub links: Vec<EntityKey>,
    /// Event-specific content.
    pub body: RecordBody,
}

impl DerivedRecord {
    /// Build a record for the event described by `meta`.
    pub fn new(meta: &EventMeta, links: Vec<EntityKey>, body: RecordBody) -> Self {
        Self {
            header: RecordHeader::from_meta(meta),
            links,
            body,
        }
    }

    /// The record id.
    pub const fn id(&self) -> &RecordId {
        &self.header.id
    }
}

/// Idempotence marker for one applied event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventReceipt {
    /// `<txHash>-<logIndex>` id of the event.
    pub id: RecordId,
    /// Chain position of the event.
    pub position: EventPosition,
    /// Kind of the event.
    pub kind: EventKind,
    /// Records appended by the event.
    pub record_count: usize,
}

// ---------------------------------------------------------------------------
// Record vocabulary
// ---------------------------------------------------------------------------

/// Direction of a list membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListChange {
    /// Entry added.
    Added,
    /// Entry removed.
    Removed,
}

/// Operator registration status with an AVS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    /// Registered.
    Registered,
    /// Not registered.
    Unregistered,
}

impl RegistrationStatus {
    /// Decode the on-chain status flag; `1` means registered.
    pub const fn from_flag(flag: u8) -> Self {
        if flag == 1 { Self::Registered } else { Self::Unregistered }
    }
}

/// How a delegation changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelegationType {
    /// Staker delegated.
    Delegated,
    /// Staker undelegated.
    Undelegated,
    /// Operator forced the staker out.
    ForceUndelegated,
}

/// Source of a share movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareKind {
    /// Operator shares increased.
    OperatorIncreased,
    /// Operator shares decreased.
    OperatorDecreased,
    /// Operator shares slashed.
    OperatorSlashed,
    /// Staker deposit.
    Deposit,
    /// Pod shares moved by a delta.
    PodDelta,
    /// Pod shares set to a total.
    PodNewTotal,
}

/// Movement of slashed shares awaiting burn or redistribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionKind {
    /// Pending slashed shares increased.
    BurnOrRedistributableIncreased,
    /// Pending slashed shares decreased.
    BurnOrRedistributableDecreased,
    /// Burnable strategy shares burned.
    BurnableDecreased,
    /// Burnable beacon-chain ETH shares increased.
    BurnableEthIncreased,
}

/// Phase of a queued withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalPhase {
    /// Entered the queue.
    Queued,
    /// Completed.
    Completed,
}

/// Shape of a rewards submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionKind {
    /// Funded by an AVS.
    Avs,
    /// Protocol-wide for all stakers.
    ForAll,
    /// Protocol-wide for all earners.
    ForAllEarners,
    /// Operator-directed on behalf of an AVS.
    OperatorDirectedAvs,
    /// Operator-directed on behalf of an operator set.
    OperatorDirectedOperatorSet,
}

/// Scope of an operator commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionKind {
    /// Applies to one AVS.
    AvsSpecific,
    /// Applies to programmatic incentives.
    PiSpecific,
    /// Applies to one operator set.
    OperatorSetSpecific,
}

/// Lifecycle step of a distribution root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionRootChange {
    /// Posted.
    Submitted,
    /// Disabled.
    Disabled,
}

/// An operator's allocation configuration change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "setting", rename_all = "snake_case")]
pub enum AllocationSetting {
    /// Magnitude allocated to a set.
    Allocation {
        /// Target set.
        operator_set: OperatorSetId,
        /// Strategy.
        strategy: Address,
        /// New magnitude.
        magnitude: U256,
        /// Block the allocation takes effect.
        effect_block: u64,
    },
    /// Allocation delay.
    Delay {
        /// Delay in blocks.
        delay: u32,
        /// Block the delay takes effect.
        effect_block: u64,
    },
    /// Encumbered magnitude for a strategy.
    EncumberedMagnitude {
        /// Strategy.
        strategy: Address,
        /// New value.
        magnitude: U256,
    },
    /// Maximum magnitude for a strategy.
    MaxMagnitude {
        /// Strategy.
        strategy: Address,
        /// New value.
        magnitude: U256,
    },
}

/// A protocol configuration change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "setting", rename_all = "snake_case")]
pub enum ProtocolSetting {
    /// Operator delegation approver.
    DelegationApprover {
        /// Operator.
        operator: Address,
        /// New approver.
        approver: Address,
    },
    /// AVS registrar contract.
    AvsRegistrar {
        /// AVS.
        avs: Address,
        /// Registrar.
        registrar: Address,
    },
    /// Operator set redistribution recipient.
    RedistributionRecipient {
        /// Set.
        operator_set: OperatorSetId,
        /// Recipient.
        recipient: Address,
    },
    /// Staker deposit scaling factor.
    DepositScalingFactor {
        /// Staker.
        staker: Address,
        /// Strategy.
        strategy: Address,
        /// New factor.
        factor: U256,
    },
    /// Rewards activation delay.
    ActivationDelay {
        /// Delay before.
        old: u32,
        /// Delay after.
        new: u32,
    },
    /// Default operator commission.
    DefaultOperatorSplit {
        /// Bips before.
        old: u16,
        /// Bips after.
        new: u16,
    },
}

/// Event-specific content of a derived record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
#[allow(clippy::large_enum_variant)]
pub enum RecordBody {
    /// An operator registered.
    OperatorRegistration {
        /// Operator.
        operator: Address,
        /// Initial approver.
        delegation_approver: Address,
    },
    /// An operator or AVS announced metadata.
    MetadataUpdate {
        /// Announcing entity.
        subject: EntityKey,
        /// New URI.
        metadata_uri: String,
    },
    /// An operator's registration with an AVS changed.
    AvsRegistration {
        /// Relationship id.
        relationship: RegistrationId,
        /// Operator.
        operator: Address,
        /// AVS.
        avs: Address,
        /// New status.
        status: RegistrationStatus,
    },
    /// An operator set was created.
    OperatorSetCreation {
        /// Set id.
        operator_set: OperatorSetId,
        /// Owning AVS.
        avs: Address,
        /// Index within the AVS.
        set_index: u32,
    },
    /// An operator joined or left a set.
    MembershipChange {
        /// Membership row affected.
        membership: MembershipId,
        /// Operator.
        operator: Address,
        /// Set.
        operator_set: OperatorSetId,
        /// Direction.
        change: ListChange,
    },
    /// A strategy joined or left a set.
    SetStrategyChange {
        /// Set.
        operator_set: OperatorSetId,
        /// Strategy.
        strategy: Address,
        /// Direction.
        change: ListChange,
    },
    /// An operator was slashed.
    Slashing {
        /// Operator.
        operator: Address,
        /// Slashing set.
        operator_set: OperatorSetId,
        /// Set owner.
        avs: Address,
        /// Strategies slashed.
        strategies: Vec<Address>,
        /// Proportion slashed per strategy.
        wad_slashed: Vec<U256>,
        /// Reason.
        description: String,
    },
    /// An operator changed allocation configuration.
    Allocation {
        /// Operator.
        operator: Address,
        /// Change.
        setting: AllocationSetting,
    },
    /// A protocol configuration changed.
    Configuration {
        /// Change.
        setting: ProtocolSetting,
    },
    /// A staker's delegation changed.
    Delegation {
        /// Relationship id.
        relationship: DelegationId,
        /// Staker.
        staker: Address,
        /// Operator delegated to or away from.
        operator: Address,
        /// How it changed.
        delegation_type: DelegationType,
        /// Operator replaced by a re-delegation.
        previous_operator: Option<Address>,
    },
    /// Shares moved.
    Share {
        /// Source of the movement.
        kind: ShareKind,
        /// Operator, when operator-scoped.
        operator: Option<Address>,
        /// Staker or pod owner.
        staker: Option<Address>,
        /// Strategy, when strategy-scoped.
        strategy: Option<Address>,
        /// Pod, when pod-scoped.
        pod: Option<Address>,
        /// Signed change applied.
        delta: I256,
        /// Total after the change, when tracked.
        new_total: Option<I256>,
    },
    /// Slashed shares moved toward burn or redistribution.
    ShareResolution {
        /// Movement.
        kind: ResolutionKind,
        /// Set whose slashing produced the shares.
        operator_set: Option<OperatorSetId>,
        /// Strategy.
        strategy: Option<Address>,
        /// Shares moved.
        shares: U256,
    },
    /// A staker's beacon-chain slashing factor decreased.
    BeaconChainSlashing {
        /// Staker.
        staker: Address,
        /// Factor before.
        prev_factor: u64,
        /// Factor after.
        new_factor: u64,
    },
    /// A withdrawal was queued or completed.
    Withdrawal {
        /// Phase.
        phase: WithdrawalPhase,
        /// Withdrawal root.
        withdrawal_root: B256,
        /// Staker, when known.
        staker: Option<Address>,
        /// Queued details.
        withdrawal: Option<QueuedWithdrawal>,
        /// Shares withdrawn per strategy.
        shares_to_withdraw: Vec<U256>,
    },
    /// A pod was deployed.
    PodDeployment {
        /// Pod.
        pod: Address,
        /// Owner.
        owner: Address,
    },
    /// ETH was deposited to the beacon chain.
    BeaconChainDeposit {
        /// Pod, when the owner has one.
        pod: Option<Address>,
        /// Owner.
        owner: Address,
        /// Amount in wei.
        amount: U256,
    },
    /// A beacon-chain withdrawal completed.
    BeaconChainWithdrawal {
        /// Pod, when the owner has one.
        pod: Option<Address>,
        /// Owner.
        owner: Address,
        /// Shares withdrawn.
        shares: U256,
        /// Nonce.
        nonce: U256,
        /// Operator delegated to.
        delegated_address: Address,
        /// Recipient.
        withdrawer: Address,
        /// Withdrawal root.
        withdrawal_root: B256,
    },
    /// A rewards submission was funded.
    RewardsSubmission {
        /// Shape.
        kind: SubmissionKind,
        /// Funding caller.
        submitter: Address,
        /// AVS, when AVS-scoped.
        avs: Option<Address>,
        /// Set, when set-scoped.
        operator_set: Option<OperatorSetId>,
        /// Nonce.
        submission_nonce: U256,
        /// Hash.
        submission_hash: B256,
        /// Token.
        token: Address,
        /// Amount, summed over operators for directed submissions.
        amount: U256,
        /// Window start.
        start_timestamp: u64,
        /// Window length in seconds.
        duration: u64,
        /// Strategy weights.
        strategies_and_multipliers: Vec<StrategyMultiplier>,
        /// Per-operator amounts for directed submissions.
        operator_rewards: Vec<OperatorReward>,
        /// Description for directed submissions.
        description: Option<String>,
    },
    /// An operator changed commission.
    Commission {
        /// Scope.
        kind: CommissionKind,
        /// Operator.
        operator: Address,
        /// Caller.
        caller: Address,
        /// Activation timestamp.
        activated_at: u64,
        /// Bips before.
        old_bips: u16,
        /// Bips after.
        new_bips: u16,
        /// AVS for AVS-scoped commission.
        avs: Option<Address>,
        /// Set for set-scoped commission.
        operator_set: Option<OperatorSetId>,
    },
    /// A distribution root was posted or disabled.
    DistributionRoot {
        /// Lifecycle step.
        change: DistributionRootChange,
        /// Root index.
        root_index: u32,
        /// Root, when posted.
        root: Option<B256>,
        /// Calculation end, when posted.
        rewards_calculation_end_timestamp: Option<u64>,
        /// Activation, when posted.
        activated_at: Option<u64>,
    },
    /// Rewards were claimed.
    RewardsClaim {
        /// Root.
        root: B256,
        /// Earner.
        earner: Address,
        /// Claimer.
        claimer: Address,
        /// Recipient.
        recipient: Address,
        /// Token.
        token: Address,
        /// Amount.
        claimed_amount: U256,
    },
    /// A strategy's deposit whitelisting changed.
    StrategyWhitelist {
        /// Strategy.
        strategy: Address,
        /// Direction.
        change: ListChange,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> EventMeta {
        EventMeta {
            tx_hash: B256::repeat_byte(0x22),
            log_index: 4,
            block_number: 100,
            block_timestamp: 1_700_000_000,
            contract: Address::repeat_byte(0xEE),
        }
    }

    #[test]
    fn header_copies_provenance() {
        let m = meta();
        let header = RecordHeader::from_meta(&m);
        assert_eq!(header.id, m.record_id());
        assert_eq!(header.block_number, 100);
        assert_eq!(header.contract, m.contract);
    }

    #[test]
    fn registration_flag_decodes() {
        assert_eq!(RegistrationStatus::from_flag(1), RegistrationStatus::Registered);
        assert_eq!(RegistrationStatus::from_flag(0), RegistrationStatus::Unregistered);
        assert_eq!(RegistrationStatus::from_flag(7), RegistrationStatus::Unregistered);
    }

    #[test]
    fn body_serializes_with_record_tag() {
        let record = DerivedRecord::new(
            &meta(),
            vec![EntityKey::Strategy(Address::repeat_byte(0x05))],
            RecordBody::StrategyWhitelist {
                strategy: Address::repeat_byte(0x05),
                change: ListChange::Removed,
            },
        );
        let json = serde_json::to_value(&record).unwrap_or_default();
        assert_eq!(json["body"]["record"], "strategy_whitelist");
        assert_eq!(json["body"]["change"], "REMOVED");
    }

    #[test]
    fn delegation_types_use_upper_snake_case() {
        let json = serde_json::to_string(&DelegationType::ForceUndelegated).unwrap_or_default();
        assert_eq!(json, "\"FORCE_UNDELEGATED\"");
    }
}
