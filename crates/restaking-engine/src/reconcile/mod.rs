//! Per-domain reconcilers.
//!
//! Each protocol subsystem has its own module of reconcilers, one function
//! per event variant:
//!
//! ```text
//! fn(&mut Context, &Payload) -> Result<Outcome, StoreError>
//! ```
//!
//! A reconciler stages the entities it needs through the [`Context`]'s
//! resolver, mutates the staged copies, appends at most one derived record
//! and returns [`Outcome::Applied`]. When a *required* parent is missing it
//! returns [`Outcome::Skipped`] before mutating anything; the engine then
//! discards the step.
//!
//! # Modules
//!
//! - [`operator`] -- Operator registration, metadata, AVS directory
//! - [`operator_set`] -- Set creation, membership, set strategies
//! - [`slashing`] -- Operator and beacon-chain slashing
//! - [`allocation`] -- Allocations and magnitude configuration
//! - [`delegation`] -- Delegate / undelegate / force-undelegate
//! - [`shares`] -- Operator and pod share accounting
//! - [`strategy`] -- Deposits, whitelist, burn and redistribution
//! - [`pod`] -- Pod deployment and beacon-chain deposits/withdrawals
//! - [`withdrawal`] -- Queued withdrawals
//! - [`rewards`] -- Rewards submissions, commission, distribution roots

pub mod allocation;
pub mod delegation;
pub mod operator;
pub mod operator_set;
pub mod pod;
pub mod rewards;
pub mod shares;
pub mod slashing;
pub mod strategy;
pub mod withdrawal;

use restaking_store::StoreError;
use restaking_types::{
    Address, Counter, DerivedRecord, EntityKey, EventMeta, I256, MembershipId, OperatorSetId, RecordBody,
    RecordId, U256,
};

use crate::resolver::Resolver;

/// Diagnostic severity of a skipped event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected during partial backfills.
    Warning,
    /// Indicates a processing bug or a gap in a high-priority stream.
    Error,
}

/// Why a reconciler left state unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A required parent entity is not stored.
    MissingParent {
        /// The missing entity.
        key: EntityKey,
        /// Diagnostic severity.
        severity: Severity,
    },
    /// The entity the event would create already exists.
    AlreadyExists {
        /// The existing entity.
        key: EntityKey,
    },
    /// The operator already has an open membership in the set.
    AlreadyMember {
        /// Operator.
        operator: Address,
        /// Set.
        operator_set: OperatorSetId,
    },
    /// The operator has no open membership in the set.
    NotAMember {
        /// Operator.
        operator: Address,
        /// Set.
        operator_set: OperatorSetId,
    },
    /// The staker is not delegated, so there is nothing to undelegate.
    NotDelegated {
        /// Staker.
        staker: Address,
    },
    /// The owner has no deployed pod to apply a share update to.
    NoPod {
        /// Pod owner.
        owner: Address,
    },
    /// The staker is already delegated to this operator.
    AlreadyDelegated {
        /// Staker.
        staker: Address,
        /// Current operator.
        operator: Address,
    },
    /// A re-join would reuse the id of an earlier row for the same pair,
    /// which happens when the operator left and re-joined at one timestamp.
    MembershipIdTaken {
        /// Row id both joins map to.
        membership: MembershipId,
        /// Record that opened the existing row.
        existing_record: Option<RecordId>,
        /// Record of the re-join that was not applied.
        record: RecordId,
    },
}

impl SkipReason {
    /// Diagnostic severity of this skip.
    pub const fn severity(&self) -> Severity {
        match self {
            Self::MissingParent { severity, .. } => *severity,
            Self::MembershipIdTaken { .. } => Severity::Error,
            Self::AlreadyExists { .. }
            | Self::AlreadyMember { .. }
            | Self::NotAMember { .. }
            | Self::NotDelegated { .. }
            | Self::NoPod { .. }
            | Self::AlreadyDelegated { .. } => Severity::Warning,
        }
    }
}

impl core::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingParent { key, .. } => write!(f, "missing required parent {key}"),
            Self::AlreadyExists { key } => write!(f, "{key} already exists"),
            Self::AlreadyMember { operator, operator_set } => write!(
                f,
                "operator {} already has an open membership in {operator_set}",
                restaking_types::address_id(operator)
            ),
            Self::NotAMember { operator, operator_set } => write!(
                f,
                "operator {} has no open membership in {operator_set}",
                restaking_types::address_id(operator)
            ),
            Self::NotDelegated { staker } => write!(
                f,
                "staker {} is not delegated",
                restaking_types::address_id(staker)
            ),
            Self::NoPod { owner } => write!(
                f,
                "owner {} has no pod",
                restaking_types::address_id(owner)
            ),
            Self::AlreadyDelegated { staker, operator } => write!(
                f,
                "staker {} is already delegated to {}",
                restaking_types::address_id(staker),
                restaking_types::address_id(operator)
            ),
            Self::MembershipIdTaken {
                membership,
                existing_record,
                record,
            } => match existing_record {
                Some(existing) => write!(
                    f,
                    "membership {membership} was already opened by {existing}; re-join {record} not applied"
                ),
                None => write!(f, "membership {membership} already exists; re-join {record} not applied"),
            },
        }
    }
}

/// Result of one reconciler call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// State was staged and is ready for the guard.
    Applied,
    /// State was left unchanged.
    Skipped(SkipReason),
}

/// Everything a reconciler sees while handling one event.
pub struct Context<'a> {
    /// Position and provenance of the event.
    pub meta: &'a EventMeta,
    /// Entity staging for this step.
    pub resolver: Resolver<'a>,
}

impl<'a> Context<'a> {
    /// Start a step for the event described by `meta`.
    pub const fn new(meta: &'a EventMeta, resolver: Resolver<'a>) -> Self {
        Self { meta, resolver }
    }

    /// Block timestamp of the event.
    pub const fn timestamp(&self) -> u64 {
        self.meta.block_timestamp
    }

    /// Block number of the event.
    pub const fn block(&self) -> u64 {
        self.meta.block_number
    }

    /// The event's `<txHash>-<logIndex>` id, for diagnostics.
    pub fn event_id(&self) -> String {
        self.meta.record_id().into_inner()
    }

    /// Stage every key in `keys`, returning a skip for the first one that
    /// is not stored.
    pub fn require(&mut self, keys: &[EntityKey], severity: Severity) -> Result<Option<Outcome>, StoreError> {
        for key in keys {
            if !self.resolver.exists(key)? {
                return Ok(Some(Outcome::Skipped(SkipReason::MissingParent {
                    key: key.clone(),
                    severity,
                })));
            }
        }
        Ok(None)
    }

    /// Append the derived record for this event.
    pub fn record(&mut self, links: Vec<EntityKey>, body: RecordBody) {
        self.resolver.append(DerivedRecord::new(self.meta, links, body));
    }
}

/// Skip-or-continue on a required-parent check.
macro_rules! require {
    ($cx:expr, $severity:expr, [$($key:expr),+ $(,)?]) => {
        if let Some(skip) = $cx.require(&[$($key),+], $severity)? {
            return Ok(skip);
        }
    };
}
pub(crate) use require;

/// Add one to a counter.
pub(crate) const fn increment(counter: &mut Counter) {
    *counter = counter.saturating_add(1);
}

/// Subtract one from a counter. May go below zero; the guard clamps.
pub(crate) const fn decrement(counter: &mut Counter) {
    *counter = counter.saturating_sub(1);
}

/// Convert an unsigned payload amount to a signed delta, saturating.
pub(crate) fn signed(amount: U256) -> I256 {
    I256::try_from(amount).unwrap_or(I256::MAX)
}

/// Log a negative share movement as a potential slashing signal.
pub(crate) fn warn_negative_delta(cx: &Context<'_>, subject: &EntityKey, delta: I256) {
    if delta.is_negative() {
        tracing::warn!(
            event_id = %cx.event_id(),
            entity = %subject,
            delta = %delta,
            "Negative share delta, potential slashing"
        );
    }
}
