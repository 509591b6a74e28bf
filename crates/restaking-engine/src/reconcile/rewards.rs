//! Rewards submission, commission and distribution root reconcilers.
//!
//! Everything here is append-only apart from the AVS submission counter.
//! Commission changes carry a future `activated_at`; it is recorded, not
//! applied.

use restaking_store::StoreError;
use restaking_types::events::{
    ActivationDelaySet, AvsRewardsSubmissionCreated, DefaultOperatorSplitBipsSet, DistributionRootDisabled,
    DistributionRootSubmitted, OperatorAvsSplitBipsSet, OperatorDirectedAvsRewardsSubmissionCreated,
    OperatorDirectedOperatorSetRewardsSubmissionCreated, OperatorPiSplitBipsSet, OperatorSetSplitBipsSet,
    RewardsClaimed, RewardsSubmission, RewardsSubmissionForAllCreated, RewardsSubmissionForAllEarnersCreated,
};
use restaking_types::{
    Address, B256, CommissionKind, DistributionRootChange, EntityKey, OperatorSetId, ProtocolSetting, RecordBody,
    SubmissionKind, U256,
};

use super::{Context, Outcome, increment};

/// Weak-create `avs` and count one more rewards submission on it.
fn count_submission(cx: &mut Context<'_>, avs: Address) -> Result<(), StoreError> {
    let ts = cx.timestamp();
    let avs = cx.resolver.get_or_create_avs(avs, ts)?;
    increment(&mut avs.rewards_submission_count);
    avs.touch(ts);
    Ok(())
}

fn token_submission(
    kind: SubmissionKind,
    submitter: Address,
    avs: Option<Address>,
    nonce: U256,
    hash: B256,
    submission: &RewardsSubmission,
) -> RecordBody {
    RecordBody::RewardsSubmission {
        kind,
        submitter,
        avs,
        operator_set: None,
        submission_nonce: nonce,
        submission_hash: hash,
        token: submission.token,
        amount: submission.amount,
        start_timestamp: submission.start_timestamp,
        duration: submission.duration,
        strategies_and_multipliers: submission.strategies_and_multipliers.clone(),
        operator_rewards: Vec::new(),
        description: None,
    }
}

/// `AVSRewardsSubmissionCreated`.
pub fn avs_submission(cx: &mut Context<'_>, ev: &AvsRewardsSubmissionCreated) -> Result<Outcome, StoreError> {
    count_submission(cx, ev.avs)?;
    cx.record(
        vec![EntityKey::Avs(ev.avs)],
        token_submission(
            SubmissionKind::Avs,
            ev.avs,
            Some(ev.avs),
            ev.submission_nonce,
            ev.rewards_submission_hash,
            &ev.rewards_submission,
        ),
    );
    Ok(Outcome::Applied)
}

/// `RewardsSubmissionForAllCreated`.
pub fn for_all_submission(cx: &mut Context<'_>, ev: &RewardsSubmissionForAllCreated) -> Result<Outcome, StoreError> {
    cx.record(
        Vec::new(),
        token_submission(
            SubmissionKind::ForAll,
            ev.submitter,
            None,
            ev.submission_nonce,
            ev.rewards_submission_hash,
            &ev.rewards_submission,
        ),
    );
    Ok(Outcome::Applied)
}

/// `RewardsSubmissionForAllEarnersCreated`.
pub fn for_all_earners_submission(
    cx: &mut Context<'_>,
    ev: &RewardsSubmissionForAllEarnersCreated,
) -> Result<Outcome, StoreError> {
    cx.record(
        Vec::new(),
        token_submission(
            SubmissionKind::ForAllEarners,
            ev.token_hopper,
            None,
            ev.submission_nonce,
            ev.rewards_submission_hash,
            &ev.rewards_submission,
        ),
    );
    Ok(Outcome::Applied)
}

/// `OperatorDirectedAVSRewardsSubmissionCreated`.
pub fn operator_directed_avs_submission(
    cx: &mut Context<'_>,
    ev: &OperatorDirectedAvsRewardsSubmissionCreated,
) -> Result<Outcome, StoreError> {
    count_submission(cx, ev.avs)?;
    let s = &ev.operator_directed_rewards_submission;
    cx.record(
        vec![EntityKey::Avs(ev.avs)],
        RecordBody::RewardsSubmission {
            kind: SubmissionKind::OperatorDirectedAvs,
            submitter: ev.caller,
            avs: Some(ev.avs),
            operator_set: None,
            submission_nonce: ev.submission_nonce,
            submission_hash: ev.operator_directed_rewards_submission_hash,
            token: s.token,
            amount: s.total_amount(),
            start_timestamp: s.start_timestamp,
            duration: s.duration,
            strategies_and_multipliers: s.strategies_and_multipliers.clone(),
            operator_rewards: s.operator_rewards.clone(),
            description: Some(s.description.clone()),
        },
    );
    Ok(Outcome::Applied)
}

/// `OperatorDirectedOperatorSetRewardsSubmissionCreated`.
pub fn operator_directed_set_submission(
    cx: &mut Context<'_>,
    ev: &OperatorDirectedOperatorSetRewardsSubmissionCreated,
) -> Result<Outcome, StoreError> {
    let avs = ev.operator_set.avs;
    let set_id = ev.operator_set.key();
    count_submission(cx, avs)?;

    let mut links = vec![EntityKey::Avs(avs)];
    if cx.resolver.operator_set(&set_id)?.is_some() {
        links.push(EntityKey::OperatorSet(set_id.clone()));
    }

    let s = &ev.operator_directed_rewards_submission;
    cx.record(
        links,
        RecordBody::RewardsSubmission {
            kind: SubmissionKind::OperatorDirectedOperatorSet,
            submitter: ev.caller,
            avs: Some(avs),
            operator_set: Some(set_id),
            submission_nonce: ev.submission_nonce,
            submission_hash: ev.operator_directed_rewards_submission_hash,
            token: s.token,
            amount: s.total_amount(),
            start_timestamp: s.start_timestamp,
            duration: s.duration,
            strategies_and_multipliers: s.strategies_and_multipliers.clone(),
            operator_rewards: s.operator_rewards.clone(),
            description: Some(s.description.clone()),
        },
    );
    Ok(Outcome::Applied)
}

/// A commission change about to be recorded.
struct Split {
    kind: CommissionKind,
    operator: Address,
    caller: Address,
    activated_at: u64,
    old_bips: u16,
    new_bips: u16,
    avs: Option<Address>,
    operator_set: Option<OperatorSetId>,
}

/// Weak-create the operator (and AVS), link the set if known, append the
/// commission record.
fn commission(cx: &mut Context<'_>, split: Split) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    cx.resolver.get_or_create_operator(split.operator, ts)?.touch(ts);
    let mut links = vec![EntityKey::Operator(split.operator)];
    if let Some(avs) = split.avs {
        cx.resolver.get_or_create_avs(avs, ts)?.touch(ts);
        links.push(EntityKey::Avs(avs));
    }
    if let Some(set_id) = &split.operator_set
        && cx.resolver.operator_set(set_id)?.is_some()
    {
        links.push(EntityKey::OperatorSet(set_id.clone()));
    }

    cx.record(
        links,
        RecordBody::Commission {
            kind: split.kind,
            operator: split.operator,
            caller: split.caller,
            activated_at: split.activated_at,
            old_bips: split.old_bips,
            new_bips: split.new_bips,
            avs: split.avs,
            operator_set: split.operator_set,
        },
    );
    Ok(Outcome::Applied)
}

/// `OperatorAVSSplitBipsSet`.
pub fn operator_avs_split(cx: &mut Context<'_>, ev: &OperatorAvsSplitBipsSet) -> Result<Outcome, StoreError> {
    commission(
        cx,
        Split {
            kind: CommissionKind::AvsSpecific,
            operator: ev.operator,
            caller: ev.caller,
            activated_at: ev.activated_at,
            old_bips: ev.old_split_bips,
            new_bips: ev.new_split_bips,
            avs: Some(ev.avs),
            operator_set: None,
        },
    )
}

/// `OperatorPISplitBipsSet`.
pub fn operator_pi_split(cx: &mut Context<'_>, ev: &OperatorPiSplitBipsSet) -> Result<Outcome, StoreError> {
    commission(
        cx,
        Split {
            kind: CommissionKind::PiSpecific,
            operator: ev.operator,
            caller: ev.caller,
            activated_at: ev.activated_at,
            old_bips: ev.old_split_bips,
            new_bips: ev.new_split_bips,
            avs: None,
            operator_set: None,
        },
    )
}

/// `OperatorSetSplitBipsSet`.
pub fn operator_set_split(cx: &mut Context<'_>, ev: &OperatorSetSplitBipsSet) -> Result<Outcome, StoreError> {
    commission(
        cx,
        Split {
            kind: CommissionKind::OperatorSetSpecific,
            operator: ev.operator,
            caller: ev.caller,
            activated_at: ev.activated_at,
            old_bips: ev.old_split_bips,
            new_bips: ev.new_split_bips,
            avs: None,
            operator_set: Some(ev.operator_set.key()),
        },
    )
}

/// `DistributionRootSubmitted`.
pub fn distribution_root_submitted(
    cx: &mut Context<'_>,
    ev: &DistributionRootSubmitted,
) -> Result<Outcome, StoreError> {
    cx.record(
        Vec::new(),
        RecordBody::DistributionRoot {
            change: DistributionRootChange::Submitted,
            root_index: ev.root_index,
            root: Some(ev.root),
            rewards_calculation_end_timestamp: Some(ev.rewards_calculation_end_timestamp),
            activated_at: Some(ev.activated_at),
        },
    );
    Ok(Outcome::Applied)
}

/// `DistributionRootDisabled`.
pub fn distribution_root_disabled(cx: &mut Context<'_>, ev: &DistributionRootDisabled) -> Result<Outcome, StoreError> {
    cx.record(
        Vec::new(),
        RecordBody::DistributionRoot {
            change: DistributionRootChange::Disabled,
            root_index: ev.root_index,
            root: None,
            rewards_calculation_end_timestamp: None,
            activated_at: None,
        },
    );
    Ok(Outcome::Applied)
}

/// `RewardsClaimed`.
pub fn rewards_claimed(cx: &mut Context<'_>, ev: &RewardsClaimed) -> Result<Outcome, StoreError> {
    cx.record(
        Vec::new(),
        RecordBody::RewardsClaim {
            root: ev.root,
            earner: ev.earner,
            claimer: ev.claimer,
            recipient: ev.recipient,
            token: ev.token,
            claimed_amount: ev.claimed_amount,
        },
    );
    Ok(Outcome::Applied)
}

/// `ActivationDelaySet`.
pub fn activation_delay_set(cx: &mut Context<'_>, ev: &ActivationDelaySet) -> Result<Outcome, StoreError> {
    cx.record(
        Vec::new(),
        RecordBody::Configuration {
            setting: ProtocolSetting::ActivationDelay {
                old: ev.old_activation_delay,
                new: ev.new_activation_delay,
            },
        },
    );
    Ok(Outcome::Applied)
}

/// `DefaultOperatorSplitBipsSet`.
pub fn default_operator_split_set(
    cx: &mut Context<'_>,
    ev: &DefaultOperatorSplitBipsSet,
) -> Result<Outcome, StoreError> {
    cx.record(
        Vec::new(),
        RecordBody::Configuration {
            setting: ProtocolSetting::DefaultOperatorSplit {
                old: ev.old_default_operator_split_bips,
                new: ev.new_default_operator_split_bips,
            },
        },
    );
    Ok(Outcome::Applied)
}

#[cfg(test)]
mod tests {
    use restaking_store::MemoryStore;
    use restaking_types::events::OperatorDirectedSubmission;
    use restaking_types::{EventMeta, OperatorReward, OperatorSetRef};

    use super::*;
    use crate::resolver::Resolver;

    fn meta() -> EventMeta {
        EventMeta {
            tx_hash: B256::repeat_byte(0x0B),
            log_index: 0,
            block_number: 110,
            block_timestamp: 1_320,
            contract: Address::ZERO,
        }
    }

    #[test]
    fn operator_directed_amount_is_sum_of_operator_amounts() {
        let store = MemoryStore::new();
        let m = meta();
        let mut cx = Context::new(&m, Resolver::new(&store));
        let set = OperatorSetRef { avs: Address::repeat_byte(0x02), id: 3 };
        let ev = OperatorDirectedOperatorSetRewardsSubmissionCreated {
            caller: Address::repeat_byte(0x02),
            operator_directed_rewards_submission_hash: B256::repeat_byte(0x44),
            operator_set: set,
            submission_nonce: U256::from(1_u64),
            operator_directed_rewards_submission: OperatorDirectedSubmission {
                strategies_and_multipliers: Vec::new(),
                token: Address::repeat_byte(0x0C),
                operator_rewards: vec![
                    OperatorReward { operator: Address::repeat_byte(0x01), amount: U256::from(7_u64) },
                    OperatorReward { operator: Address::repeat_byte(0x03), amount: U256::from(5_u64) },
                ],
                start_timestamp: 0,
                duration: 604_800,
                description: "weekly".to_owned(),
            },
        };
        assert_eq!(operator_directed_set_submission(&mut cx, &ev).ok(), Some(Outcome::Applied));

        let arena = cx.resolver.into_arena();
        assert_eq!(
            arena.avss.get(&set.avs).map(|s| s.after.rewards_submission_count),
            Some(1)
        );
        let record = arena.records.first();
        assert!(matches!(
            record.map(|r| &r.body),
            Some(RecordBody::RewardsSubmission { amount, .. }) if *amount == U256::from(12_u64)
        ));
        // Set was never created, so only the AVS is linked.
        assert_eq!(record.map(|r| r.links.len()), Some(1));
    }

    #[test]
    fn commission_records_future_activation() {
        let store = MemoryStore::new();
        let m = meta();
        let mut cx = Context::new(&m, Resolver::new(&store));
        let ev = OperatorAvsSplitBipsSet {
            caller: Address::repeat_byte(0x01),
            operator: Address::repeat_byte(0x01),
            avs: Address::repeat_byte(0x02),
            activated_at: 9_999,
            old_split_bips: 1_000,
            new_split_bips: 500,
        };
        assert_eq!(operator_avs_split(&mut cx, &ev).ok(), Some(Outcome::Applied));
        let arena = cx.resolver.into_arena();
        assert!(matches!(
            arena.records.first().map(|r| &r.body),
            Some(RecordBody::Commission { activated_at: 9_999, new_bips: 500, .. })
        ));
    }
}
