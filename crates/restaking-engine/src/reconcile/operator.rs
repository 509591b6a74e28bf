//! Operator lifecycle and AVS directory reconcilers.

use restaking_store::StoreError;
use restaking_types::events::{
    AvsMetadataUriUpdated, AvsRegistrarSet, DelegationApproverUpdated, OperatorAvsRegistrationStatusUpdated,
    OperatorMetadataUriUpdated, OperatorRegistered,
};
use restaking_types::{EntityKey, ProtocolSetting, RecordBody, RegistrationId, RegistrationStatus};

use super::{Context, Outcome, Severity, decrement, increment, require};

/// `OperatorRegistered`: create the operator, or fill in the registration
/// fields of one that was weak-created by an earlier event.
pub fn operator_registered(cx: &mut Context<'_>, ev: &OperatorRegistered) -> Result<Outcome, StoreError> {
    let (ts, block) = (cx.timestamp(), cx.block());
    let record_id = cx.meta.record_id();

    let op = cx.resolver.get_or_create_operator(ev.operator, ts)?;
    if op.registered_at.is_some() {
        tracing::warn!(
            event_id = %record_id,
            operator = %ev.operator,
            "Operator registered twice; keeping latest registration"
        );
    }
    op.delegation_approver = ev.delegation_approver;
    op.registered_at = Some(ts);
    op.registered_at_block = Some(block);
    op.registration_record = Some(record_id);
    op.touch(ts);

    cx.record(
        vec![EntityKey::Operator(ev.operator)],
        RecordBody::OperatorRegistration {
            operator: ev.operator,
            delegation_approver: ev.delegation_approver,
        },
    );
    Ok(Outcome::Applied)
}

/// `OperatorMetadataURIUpdated`: requires the operator.
pub fn operator_metadata_updated(cx: &mut Context<'_>, ev: &OperatorMetadataUriUpdated) -> Result<Outcome, StoreError> {
    let key = EntityKey::Operator(ev.operator);
    require!(cx, Severity::Warning, [key.clone()]);

    let ts = cx.timestamp();
    if let Some(op) = cx.resolver.operator(ev.operator)? {
        op.metadata_uri = Some(ev.metadata_uri.clone());
        op.touch(ts);
    }
    cx.record(
        vec![key.clone()],
        RecordBody::MetadataUpdate {
            subject: key,
            metadata_uri: ev.metadata_uri.clone(),
        },
    );
    Ok(Outcome::Applied)
}

/// `DelegationApproverUpdated`: requires the operator.
pub fn delegation_approver_updated(cx: &mut Context<'_>, ev: &DelegationApproverUpdated) -> Result<Outcome, StoreError> {
    let key = EntityKey::Operator(ev.operator);
    require!(cx, Severity::Warning, [key.clone()]);

    let ts = cx.timestamp();
    if let Some(op) = cx.resolver.operator(ev.operator)? {
        op.delegation_approver = ev.new_delegation_approver;
        op.touch(ts);
    }
    cx.record(
        vec![key],
        RecordBody::Configuration {
            setting: ProtocolSetting::DelegationApprover {
                operator: ev.operator,
                approver: ev.new_delegation_approver,
            },
        },
    );
    Ok(Outcome::Applied)
}

/// `OperatorAVSRegistrationStatusUpdated`: weak-creates both sides and moves
/// the registration counters up or down together.
pub fn registration_status_updated(
    cx: &mut Context<'_>,
    ev: &OperatorAvsRegistrationStatusUpdated,
) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let status = RegistrationStatus::from_flag(ev.status);
    let adjust = match status {
        RegistrationStatus::Registered => increment,
        RegistrationStatus::Unregistered => decrement,
    };

    let op = cx.resolver.get_or_create_operator(ev.operator, ts)?;
    adjust(&mut op.avs_registration_count);
    op.touch(ts);

    let avs = cx.resolver.get_or_create_avs(ev.avs, ts)?;
    adjust(&mut avs.total_operator_registrations);
    avs.touch(ts);

    cx.record(
        vec![EntityKey::Operator(ev.operator), EntityKey::Avs(ev.avs)],
        RecordBody::AvsRegistration {
            relationship: RegistrationId::new(&ev.operator, &ev.avs, ts),
            operator: ev.operator,
            avs: ev.avs,
            status,
        },
    );
    Ok(Outcome::Applied)
}

/// `AVSMetadataURIUpdated`: weak-creates the AVS.
pub fn avs_metadata_updated(cx: &mut Context<'_>, ev: &AvsMetadataUriUpdated) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let avs = cx.resolver.get_or_create_avs(ev.avs, ts)?;
    avs.metadata_uri = Some(ev.metadata_uri.clone());
    avs.touch(ts);

    let key = EntityKey::Avs(ev.avs);
    cx.record(
        vec![key.clone()],
        RecordBody::MetadataUpdate {
            subject: key,
            metadata_uri: ev.metadata_uri.clone(),
        },
    );
    Ok(Outcome::Applied)
}

/// `AVSRegistrarSet`: weak-creates the AVS.
pub fn avs_registrar_set(cx: &mut Context<'_>, ev: &AvsRegistrarSet) -> Result<Outcome, StoreError> {
    let ts = cx.timestamp();
    let avs = cx.resolver.get_or_create_avs(ev.avs, ts)?;
    avs.registrar = Some(ev.registrar);
    avs.touch(ts);

    cx.record(
        vec![EntityKey::Avs(ev.avs)],
        RecordBody::Configuration {
            setting: ProtocolSetting::AvsRegistrar {
                avs: ev.avs,
                registrar: ev.registrar,
            },
        },
    );
    Ok(Outcome::Applied)
}
