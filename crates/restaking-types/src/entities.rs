//! Mutable aggregate state.
//!
//! Entities are the read-modify-write side of the index. Each one is keyed
//! deterministically (see [`crate::ids`]) and carries zero-initialized
//! counters that reconcilers adjust as events arrive.
//!
//! Counters are stored as signed [`Counter`] values so that a transition
//! below zero is observable before the invariant guard clamps it. Persisted
//! counters are never negative.

use alloy_primitives::{Address, I256};
use serde::{Deserialize, Serialize};

use crate::ids::{EntityKey, MembershipId, OperatorSetId, RecordId};

/// A non-negative activity counter.
pub type Counter = i64;

/// Access to the named counters of an entity.
///
/// The invariant guard walks these to find and clamp negative values.
pub trait Counters {
    /// Every counter on the entity, by field name.
    fn counters_mut(&mut self) -> Vec<(&'static str, &mut Counter)>;

    /// The key of this entity.
    fn key(&self) -> EntityKey;
}

/// A registered operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    /// Operator address.
    pub address: Address,
    /// Address allowed to approve delegations; zero when unset.
    pub delegation_approver: Address,
    /// Latest metadata URI, if any was announced.
    pub metadata_uri: Option<String>,
    /// Stakers currently delegated to this operator.
    pub delegator_count: Counter,
    /// Registration status changes observed against AVSs.
    pub avs_registration_count: Counter,
    /// Operator sets this operator is currently a member of.
    pub operator_set_count: Counter,
    /// Slashings applied to this operator.
    pub slashing_event_count: Counter,
    /// Timestamp of the explicit registration event.
    pub registered_at: Option<u64>,
    /// Block of the explicit registration event.
    pub registered_at_block: Option<u64>,
    /// Record of the explicit registration event.
    pub registration_record: Option<RecordId>,
    /// Timestamp of the most recent event touching this operator.
    pub last_activity_at: u64,
    /// Timestamp of the most recent mutation.
    pub updated_at: u64,
}

impl Operator {
    /// A zero-initialized operator first seen at `timestamp`.
    pub const fn new(address: Address, timestamp: u64) -> Self {
        Self {
            address,
            delegation_approver: Address::ZERO,
            metadata_uri: None,
            delegator_count: 0,
            avs_registration_count: 0,
            operator_set_count: 0,
            slashing_event_count: 0,
            registered_at: None,
            registered_at_block: None,
            registration_record: None,
            last_activity_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Mark activity at `timestamp`.
    pub const fn touch(&mut self, timestamp: u64) {
        self.last_activity_at = timestamp;
        self.updated_at = timestamp;
    }
}

impl Counters for Operator {
    fn counters_mut(&mut self) -> Vec<(&'static str, &mut Counter)> {
        vec![
            ("delegator_count", &mut self.delegator_count),
            ("avs_registration_count", &mut self.avs_registration_count),
            ("operator_set_count", &mut self.operator_set_count),
            ("slashing_event_count", &mut self.slashing_event_count),
        ]
    }

    fn key(&self) -> EntityKey {
        EntityKey::Operator(self.address)
    }
}

/// An actively validated service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avs {
    /// AVS address.
    pub address: Address,
    /// Latest metadata URI, if any was announced.
    pub metadata_uri: Option<String>,
    /// Registrar contract, if one was set.
    pub registrar: Option<Address>,
    /// Operator sets created under this AVS.
    pub operator_set_count: Counter,
    /// Operator registration status changes observed.
    pub total_operator_registrations: Counter,
    /// Rewards submissions funded for this AVS.
    pub rewards_submission_count: Counter,
    /// Slashings issued through this AVS's sets.
    pub slashing_event_count: Counter,
    /// Timestamp the AVS was first seen.
    pub created_at: u64,
    /// Timestamp of the most recent event touching this AVS.
    pub last_activity_at: u64,
    /// Timestamp of the most recent mutation.
    pub updated_at: u64,
}

impl Avs {
    /// A zero-initialized AVS first seen at `timestamp`.
    pub const fn new(address: Address, timestamp: u64) -> Self {
        Self {
            address,
            metadata_uri: None,
            registrar: None,
            operator_set_count: 0,
            total_operator_registrations: 0,
            rewards_submission_count: 0,
            slashing_event_count: 0,
            created_at: timestamp,
            last_activity_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Mark activity at `timestamp`.
    pub const fn touch(&mut self, timestamp: u64) {
        self.last_activity_at = timestamp;
        self.updated_at = timestamp;
    }
}

impl Counters for Avs {
    fn counters_mut(&mut self) -> Vec<(&'static str, &mut Counter)> {
        vec![
            ("operator_set_count", &mut self.operator_set_count),
            ("total_operator_registrations", &mut self.total_operator_registrations),
            ("rewards_submission_count", &mut self.rewards_submission_count),
            ("slashing_event_count", &mut self.slashing_event_count),
        ]
    }

    fn key(&self) -> EntityKey {
        EntityKey::Avs(self.address)
    }
}

/// A grouping of operators under one AVS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSet {
    /// Composite `<avs>-<setIndex>` id.
    pub id: OperatorSetId,
    /// Owning AVS.
    pub avs: Address,
    /// Index of the set within its AVS.
    pub set_index: u32,
    /// Recipient of redistributed slashed funds, if configured.
    pub redistribution_recipient: Option<Address>,
    /// Operators currently in the set.
    pub member_count: Counter,
    /// Strategies currently in the set.
    pub strategy_count: Counter,
    /// Allocation updates targeting the set.
    pub allocation_count: Counter,
    /// Slashings issued against the set.
    pub slashing_event_count: Counter,
    /// Timestamp of creation.
    pub created_at: u64,
    /// Block of creation.
    pub created_at_block: u64,
    /// Timestamp of the most recent event touching this set.
    pub last_activity_at: u64,
}

impl OperatorSet {
    /// A zero-initialized set created at `timestamp` in `block`.
    pub const fn new(id: OperatorSetId, avs: Address, set_index: u32, timestamp: u64, block: u64) -> Self {
        Self {
            id,
            avs,
            set_index,
            redistribution_recipient: None,
            member_count: 0,
            strategy_count: 0,
            allocation_count: 0,
            slashing_event_count: 0,
            created_at: timestamp,
            created_at_block: block,
            last_activity_at: timestamp,
        }
    }
}

impl Counters for OperatorSet {
    fn counters_mut(&mut self) -> Vec<(&'static str, &mut Counter)> {
        vec![
            ("member_count", &mut self.member_count),
            ("strategy_count", &mut self.strategy_count),
            ("allocation_count", &mut self.allocation_count),
            ("slashing_event_count", &mut self.slashing_event_count),
        ]
    }

    fn key(&self) -> EntityKey {
        EntityKey::OperatorSet(self.id.clone())
    }
}

/// A restakable strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Strategy address.
    pub address: Address,
    /// Net operator shares; never persisted negative.
    pub total_shares: I256,
    /// Deposits observed into the strategy.
    pub total_deposits: Counter,
    /// Whether deposits are currently allowed. Assumed until a removal is seen.
    pub is_whitelisted: bool,
    /// Timestamp of the last whitelist addition.
    pub whitelisted_at: Option<u64>,
    /// Timestamp of the first deposit.
    pub first_deposit_at: Option<u64>,
    /// Timestamp of the most recent event touching this strategy.
    pub last_activity_at: u64,
}

impl Strategy {
    /// A zero-initialized strategy first seen at `timestamp`.
    pub const fn new(address: Address, timestamp: u64) -> Self {
        Self {
            address,
            total_shares: I256::ZERO,
            total_deposits: 0,
            is_whitelisted: true,
            whitelisted_at: None,
            first_deposit_at: None,
            last_activity_at: timestamp,
        }
    }
}

impl Counters for Strategy {
    fn counters_mut(&mut self) -> Vec<(&'static str, &mut Counter)> {
        vec![("total_deposits", &mut self.total_deposits)]
    }

    fn key(&self) -> EntityKey {
        EntityKey::Strategy(self.address)
    }
}

/// A depositor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staker {
    /// Staker address.
    pub address: Address,
    /// Operator currently delegated to.
    pub delegated_operator: Option<Address>,
    /// Timestamp of the current delegation.
    pub delegated_at: Option<u64>,
    /// Delegation changes observed.
    pub delegation_change_count: Counter,
    /// Withdrawals queued or completed.
    pub withdrawal_count: Counter,
    /// Timestamp the staker was first seen.
    pub first_activity_at: u64,
    /// Timestamp of the most recent event touching this staker.
    pub last_activity_at: u64,
}

impl Staker {
    /// A zero-initialized, undelegated staker first seen at `timestamp`.
    pub const fn new(address: Address, timestamp: u64) -> Self {
        Self {
            address,
            delegated_operator: None,
            delegated_at: None,
            delegation_change_count: 0,
            withdrawal_count: 0,
            first_activity_at: timestamp,
            last_activity_at: timestamp,
        }
    }
}

impl Counters for Staker {
    fn counters_mut(&mut self) -> Vec<(&'static str, &mut Counter)> {
        vec![
            ("delegation_change_count", &mut self.delegation_change_count),
            ("withdrawal_count", &mut self.withdrawal_count),
        ]
    }

    fn key(&self) -> EntityKey {
        EntityKey::Staker(self.address)
    }
}

/// A beacon-chain restaking pod.
///
/// Unlike strategy totals, pod shares may legitimately go negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EigenPod {
    /// Pod contract address.
    pub address: Address,
    /// Owning staker.
    pub owner: Address,
    /// Net pod shares.
    pub total_shares: I256,
    /// Beacon-chain deposits observed.
    pub deposit_count: Counter,
    /// Beacon-chain withdrawals completed.
    pub withdrawal_count: Counter,
    /// Timestamp of deployment.
    pub deployed_at: u64,
    /// Record of the deployment event.
    pub deployment_record: RecordId,
    /// Timestamp of the most recent event touching this pod.
    pub last_activity_at: u64,
}

impl EigenPod {
    /// A zero-balance pod deployed at `timestamp` by the event `record`.
    pub const fn new(address: Address, owner: Address, timestamp: u64, record: RecordId) -> Self {
        Self {
            address,
            owner,
            total_shares: I256::ZERO,
            deposit_count: 0,
            withdrawal_count: 0,
            deployed_at: timestamp,
            deployment_record: record,
            last_activity_at: timestamp,
        }
    }
}

impl Counters for EigenPod {
    fn counters_mut(&mut self) -> Vec<(&'static str, &mut Counter)> {
        vec![
            ("deposit_count", &mut self.deposit_count),
            ("withdrawal_count", &mut self.withdrawal_count),
        ]
    }

    fn key(&self) -> EntityKey {
        EntityKey::EigenPod(self.address)
    }
}

/// An operator's membership in an operator set.
///
/// A row is open while `left_at` is `None`. At most one open row exists per
/// (operator, set) pair; leaving closes the row instead of deleting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSetMembership {
    /// Composite `<operator>-<setId>-<joinedAt>` id.
    pub id: MembershipId,
    /// Member operator.
    pub operator: Address,
    /// Set joined.
    pub operator_set: OperatorSetId,
    /// Timestamp of joining.
    pub joined_at: u64,
    /// Block of joining.
    pub joined_at_block: u64,
    /// Record of the join event.
    pub join_record: RecordId,
    /// Timestamp of leaving, once closed.
    pub left_at: Option<u64>,
    /// Block of leaving, once closed.
    pub left_at_block: Option<u64>,
    /// Record of the leave event, once closed.
    pub leave_record: Option<RecordId>,
}

impl OperatorSetMembership {
    /// Whether the membership is still open.
    pub const fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_operator_is_zeroed() {
        let mut op = Operator::new(Address::repeat_byte(0x01), 100);
        assert_eq!(op.delegation_approver, Address::ZERO);
        assert!(op.metadata_uri.is_none());
        assert!(op.registered_at.is_none());
        assert!(op.counters_mut().iter().all(|(_, c)| **c == 0));
        assert_eq!(op.last_activity_at, 100);
    }

    #[test]
    fn new_strategy_assumes_whitelisted() {
        let s = Strategy::new(Address::repeat_byte(0x05), 1);
        assert!(s.is_whitelisted);
        assert_eq!(s.total_shares, I256::ZERO);
        assert!(s.first_deposit_at.is_none());
    }

    #[test]
    fn counters_are_named() {
        let mut set = OperatorSet::new(
            OperatorSetId::new(&Address::repeat_byte(0x02), 0),
            Address::repeat_byte(0x02),
            0,
            1,
            1,
        );
        let names: Vec<&str> = set.counters_mut().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"member_count"));
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn membership_open_until_left() {
        let set = OperatorSetId::new(&Address::repeat_byte(0x02), 0);
        let op = Address::repeat_byte(0x01);
        let mut m = OperatorSetMembership {
            id: MembershipId::new(&op, &set, 5),
            operator: op,
            operator_set: set,
            joined_at: 5,
            joined_at_block: 1,
            join_record: RecordId::new(&alloy_primitives::B256::ZERO, 0),
            left_at: None,
            left_at_block: None,
            leave_record: None,
        };
        assert!(m.is_active());
        m.left_at = Some(9);
        assert!(!m.is_active());
    }
}
