//! Shared type definitions for the restaking state index.
//!
//! This crate is the single source of truth for the shapes that flow
//! through the workspace: decoded protocol events on the way in, mutable
//! entities and append-only derived records on the way out.
//!
//! # Modules
//!
//! - [`ids`] -- Deterministic identifiers and entity keys
//! - [`entities`] -- Mutable aggregate state (operators, sets, pods, ...)
//! - [`records`] -- Append-only derived records and event receipts
//! - [`events`] -- Decoded protocol events and their metadata

pub mod entities;
pub mod events;
pub mod ids;
pub mod records;

pub use alloy_primitives::{Address, B256, I256, U256};
pub use entities::{
    Avs, Counter, Counters, EigenPod, Operator, OperatorSet, OperatorSetMembership, Staker, Strategy,
};
pub use events::{
    EventKind, EventMeta, EventPayload, EventPosition, OperatorReward, OperatorSetRef,
    ProtocolEvent, QueuedWithdrawal, StrategyMultiplier,
};
pub use ids::{
    DelegationId, EntityKey, EntityKind, MembershipId, OperatorSetId, RecordId, RegistrationId,
    address_id, hash_id,
};
pub use records::{
    AllocationSetting, CommissionKind, DelegationType, DerivedRecord, DistributionRootChange,
    EventReceipt, ListChange, ProtocolSetting, RecordBody, RecordHeader, RegistrationStatus,
    ResolutionKind, ShareKind, SubmissionKind, WithdrawalPhase,
};
