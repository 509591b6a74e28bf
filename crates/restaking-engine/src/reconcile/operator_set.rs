//! Operator set lifecycle and membership reconcilers.
//!
//! Membership changes move `Operator.operator_set_count` and
//! `OperatorSet.member_count` together and open or close exactly one
//! [`OperatorSetMembership`] row. Removal closes the open row by stamping
//! `left_at`; rows are never deleted.

use restaking_store::StoreError;
use restaking_types::events::{
    OperatorSetCreated, OperatorSetMembershipChanged, OperatorSetStrategyChanged, RedistributionAddressSet,
};
use restaking_types::{
    EntityKey, ListChange, MembershipId, OperatorSet, OperatorSetMembership, ProtocolSetting, RecordBody,
};

use super::{Context, Outcome, Severity, SkipReason, decrement, increment, require};

/// `OperatorSetCreated`: weak-creates the AVS and creates the set.
pub fn operator_set_created(cx: &mut Context<'_>, ev: &OperatorSetCreated) -> Result<Outcome, StoreError> {
    let (ts, block) = (cx.timestamp(), cx.block());
    let set_ref = ev.operator_set;
    let id = set_ref.key();

    if cx.resolver.operator_set(&id)?.is_some() {
        return Ok(Outcome::Skipped(SkipReason::AlreadyExists {
            key: EntityKey::OperatorSet(id),
        }));
    }

    let avs = cx.resolver.get_or_create_avs(set_ref.avs, ts)?;
    increment(&mut avs.operator_set_count);
    avs.touch(ts);

    cx.resolver
        .create_operator_set(OperatorSet::new(id.clone(), set_ref.avs, set_ref.id, ts, block))?;

    cx.record(
        vec![EntityKey::OperatorSet(id.clone()), EntityKey::Avs(set_ref.avs)],
        RecordBody::OperatorSetCreation {
            operator_set: id,
            avs: set_ref.avs,
            set_index: set_ref.id,
        },
    );
    Ok(Outcome::Applied)
}

/// `OperatorAddedToOperatorSet`: opens a membership row.
pub fn operator_added(cx: &mut Context<'_>, ev: &OperatorSetMembershipChanged) -> Result<Outcome, StoreError> {
    let (ts, block) = (cx.timestamp(), cx.block());
    let set_id = ev.operator_set.key();
    require!(
        cx,
        Severity::Warning,
        [EntityKey::Operator(ev.operator), EntityKey::OperatorSet(set_id.clone())]
    );

    if cx.resolver.open_membership(ev.operator, &set_id)?.is_some() {
        return Ok(Outcome::Skipped(SkipReason::AlreadyMember {
            operator: ev.operator,
            operator_set: set_id,
        }));
    }

    let membership_id = MembershipId::new(&ev.operator, &set_id, ts);
    let opened = cx.resolver.create_membership(OperatorSetMembership {
        id: membership_id.clone(),
        operator: ev.operator,
        operator_set: set_id.clone(),
        joined_at: ts,
        joined_at_block: block,
        join_record: cx.meta.record_id(),
        left_at: None,
        left_at_block: None,
        leave_record: None,
    })?;
    if !opened {
        // Left and re-joined at the same timestamp.
        let existing_record = cx.resolver.membership(&membership_id)?.map(|m| m.join_record.clone());
        return Ok(Outcome::Skipped(SkipReason::MembershipIdTaken {
            membership: membership_id,
            existing_record,
            record: cx.meta.record_id(),
        }));
    }

    if let Some(op) = cx.resolver.operator(ev.operator)? {
        increment(&mut op.operator_set_count);
        op.touch(ts);
    }
    if let Some(set) = cx.resolver.operator_set(&set_id)? {
        increment(&mut set.member_count);
        set.last_activity_at = ts;
    }

    cx.record(
        vec![
            EntityKey::Operator(ev.operator),
            EntityKey::OperatorSet(set_id.clone()),
            EntityKey::Membership(membership_id.clone()),
        ],
        RecordBody::MembershipChange {
            membership: membership_id,
            operator: ev.operator,
            operator_set: set_id,
            change: ListChange::Added,
        },
    );
    Ok(Outcome::Applied)
}

/// `OperatorRemovedFromOperatorSet`: closes the open membership row.
pub fn operator_removed(cx: &mut Context<'_>, ev: &OperatorSetMembershipChanged) -> Result<Outcome, StoreError> {
    let (ts, block) = (cx.timestamp(), cx.block());
    let record_id = cx.meta.record_id();
    let set_id = ev.operator_set.key();
    require!(
        cx,
        Severity::Warning,
        [EntityKey::Operator(ev.operator), EntityKey::OperatorSet(set_id.clone())]
    );

    let Some(membership) = cx.resolver.open_membership(ev.operator, &set_id)? else {
        return Ok(Outcome::Skipped(SkipReason::NotAMember {
            operator: ev.operator,
            operator_set: set_id,
        }));
    };
    membership.left_at = Some(ts);
    membership.left_at_block = Some(block);
    membership.leave_record = Some(record_id);
    let membership_id = membership.id.clone();

    if let Some(op) = cx.resolver.operator(ev.operator)? {
        decrement(&mut op.operator_set_count);
        op.touch(ts);
    }
    if let Some(set) = cx.resolver.operator_set(&set_id)? {
        decrement(&mut set.member_count);
        set.last_activity_at = ts;
    }

    cx.record(
        vec![
            EntityKey::Operator(ev.operator),
            EntityKey::OperatorSet(set_id.clone()),
            EntityKey::Membership(membership_id.clone()),
        ],
        RecordBody::MembershipChange {
            membership: membership_id,
            operator: ev.operator,
            operator_set: set_id,
            change: ListChange::Removed,
        },
    );
    Ok(Outcome::Applied)
}

/// `StrategyAddedToOperatorSet` / `StrategyRemovedFromOperatorSet`.
pub fn strategy_changed(
    cx: &mut Context<'_>,
    ev: &OperatorSetStrategyChanged,
    change: ListChange,
) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let set_id = ev.operator_set.key();
    require!(cx, Severity::Warning, [EntityKey::OperatorSet(set_id.clone())]);

    let strategy = cx.resolver.get_or_create_strategy(ev.strategy, ts)?;
    strategy.last_activity_at = ts;

    if let Some(set) = cx.resolver.operator_set(&set_id)? {
        match change {
            ListChange::Added => increment(&mut set.strategy_count),
            ListChange::Removed => decrement(&mut set.strategy_count),
        }
        set.last_activity_at = ts;
    }

    cx.record(
        vec![EntityKey::OperatorSet(set_id.clone()), EntityKey::Strategy(ev.strategy)],
        RecordBody::SetStrategyChange {
            operator_set: set_id,
            strategy: ev.strategy,
            change,
        },
    );
    Ok(Outcome::Applied)
}

/// `RedistributionAddressSet`: requires the set.
pub fn redistribution_address_set(cx: &mut Context<'_>, ev: &RedistributionAddressSet) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let set_id = ev.operator_set.key();
    require!(cx, Severity::Warning, [EntityKey::OperatorSet(set_id.clone())]);

    if let Some(set) = cx.resolver.operator_set(&set_id)? {
        set.redistribution_recipient = Some(ev.redistribution_recipient);
        set.last_activity_at = ts;
    }

    cx.record(
        vec![EntityKey::OperatorSet(set_id.clone())],
        RecordBody::Configuration {
            setting: ProtocolSetting::RedistributionRecipient {
                operator_set: set_id,
                recipient: ev.redistribution_recipient,
            },
        },
    );
    Ok(Outcome::Applied)
}
