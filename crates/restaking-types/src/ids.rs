//! Deterministic identifiers.
//!
//! Every identifier in the index is derived from on-chain data, so replaying
//! the same event stream always produces the same keys. Addresses and hashes
//! render as lowercase `0x`-prefixed hex; composite ids join their parts
//! with [`ID_DELIMITER`].
//!
//! | Id                 | Format                                |
//! |--------------------|---------------------------------------|
//! | [`RecordId`]       | `<txHash>-<logIndex>`                 |
//! | [`OperatorSetId`]  | `<avs>-<setIndex>`                    |
//! | [`MembershipId`]   | `<operator>-<operatorSetId>-<ts>`     |
//! | [`DelegationId`]   | `<staker>-<operator>-<ts>`            |
//! | [`RegistrationId`] | `<operator>-<avs>-<ts>`               |

use alloy_primitives::{Address, B256, hex};
use serde::{Deserialize, Serialize};

/// Separator between the parts of a composite identifier.
pub const ID_DELIMITER: char = '-';

/// Render an address as a lowercase `0x`-prefixed hex id.
pub fn address_id(address: &Address) -> String {
    hex::encode_prefixed(address)
}

/// Render a 32-byte hash as a lowercase `0x`-prefixed hex id.
pub fn hash_id(hash: &B256) -> String {
    hex::encode_prefixed(hash)
}

/// Generates a newtype wrapper around a composite string identifier.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Borrow the rendered identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the owned rendered identifier.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identity of one log occurrence, shared by its derived record and its
    /// receipt.
    RecordId
}

define_id! {
    /// Composite identity of an operator set: owning AVS plus set index.
    OperatorSetId
}

define_id! {
    /// Identity of one operator-set membership row.
    MembershipId
}

define_id! {
    /// Identity of one staker/operator delegation relationship.
    DelegationId
}

define_id! {
    /// Identity of one operator/AVS registration relationship.
    RegistrationId
}

impl RecordId {
    /// Build the id of the log at `log_index` in transaction `tx_hash`.
    pub fn new(tx_hash: &B256, log_index: u64) -> Self {
        Self(format!("{}{ID_DELIMITER}{log_index}", hash_id(tx_hash)))
    }
}

impl OperatorSetId {
    /// Build the id of set `set_index` owned by `avs`.
    pub fn new(avs: &Address, set_index: u32) -> Self {
        Self(format!("{}{ID_DELIMITER}{set_index}", address_id(avs)))
    }
}

impl MembershipId {
    /// Build the id of a membership opened at `timestamp`.
    pub fn new(operator: &Address, operator_set: &OperatorSetId, timestamp: u64) -> Self {
        Self(format!(
            "{}{ID_DELIMITER}{operator_set}{ID_DELIMITER}{timestamp}",
            address_id(operator)
        ))
    }
}

impl DelegationId {
    /// Build the id of a delegation change observed at `timestamp`.
    pub fn new(staker: &Address, operator: &Address, timestamp: u64) -> Self {
        Self(format!(
            "{}{ID_DELIMITER}{}{ID_DELIMITER}{timestamp}",
            address_id(staker),
            address_id(operator)
        ))
    }
}

impl RegistrationId {
    /// Build the id of a registration change observed at `timestamp`.
    pub fn new(operator: &Address, avs: &Address, timestamp: u64) -> Self {
        Self(format!(
            "{}{ID_DELIMITER}{}{ID_DELIMITER}{timestamp}",
            address_id(operator),
            address_id(avs)
        ))
    }
}

// ---------------------------------------------------------------------------
// Entity keys
// ---------------------------------------------------------------------------

/// The kind of a mutable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A registered operator.
    Operator,
    /// An actively validated service.
    Avs,
    /// A grouping of operators under one AVS.
    OperatorSet,
    /// A restakable strategy.
    Strategy,
    /// A depositor.
    Staker,
    /// A beacon-chain restaking pod.
    EigenPod,
    /// An operator's membership in an operator set.
    Membership,
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Operator => "operator",
            Self::Avs => "avs",
            Self::OperatorSet => "operator_set",
            Self::Strategy => "strategy",
            Self::Staker => "staker",
            Self::EigenPod => "eigen_pod",
            Self::Membership => "membership",
        };
        f.write_str(name)
    }
}

/// A typed reference to one mutable entity.
///
/// Derived records carry their resolved foreign keys as a list of these, and
/// the engine uses them to name entities in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityKey {
    /// Operator keyed by address.
    Operator(Address),
    /// AVS keyed by address.
    Avs(Address),
    /// Operator set keyed by composite id.
    OperatorSet(OperatorSetId),
    /// Strategy keyed by address.
    Strategy(Address),
    /// Staker keyed by address.
    Staker(Address),
    /// Pod keyed by pod address.
    EigenPod(Address),
    /// Membership row keyed by composite id.
    Membership(MembershipId),
}

impl EntityKey {
    /// The kind of entity this key refers to.
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Operator(_) => EntityKind::Operator,
            Self::Avs(_) => EntityKind::Avs,
            Self::OperatorSet(_) => EntityKind::OperatorSet,
            Self::Strategy(_) => EntityKind::Strategy,
            Self::Staker(_) => EntityKind::Staker,
            Self::EigenPod(_) => EntityKind::EigenPod,
            Self::Membership(_) => EntityKind::Membership,
        }
    }
}

impl core::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Operator(a) | Self::Avs(a) | Self::Strategy(a) | Self::Staker(a) | Self::EigenPod(a) => {
                write!(f, "{}:{}", self.kind(), address_id(a))
            }
            Self::OperatorSet(id) => write!(f, "{}:{id}", self.kind()),
            Self::Membership(id) => write!(f, "{}:{id}", self.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_render_lowercase_prefixed() {
        let addr = Address::repeat_byte(0xAB);
        let id = address_id(&addr);
        assert!(id.starts_with("0x"));
        assert_eq!(id.len(), 42);
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn record_id_joins_hash_and_log_index() {
        let tx = B256::repeat_byte(0x11);
        let id = RecordId::new(&tx, 7);
        assert_eq!(id.as_str(), format!("{}-7", hash_id(&tx)));
    }

    #[test]
    fn operator_set_id_is_deterministic() {
        let avs = Address::repeat_byte(0x02);
        assert_eq!(OperatorSetId::new(&avs, 3), OperatorSetId::new(&avs, 3));
        assert_ne!(OperatorSetId::new(&avs, 3), OperatorSetId::new(&avs, 4));
        assert_eq!(
            OperatorSetId::new(&avs, 3).to_string(),
            format!("{}-3", address_id(&avs))
        );
    }

    #[test]
    fn membership_id_embeds_set_and_timestamp() {
        let op = Address::repeat_byte(0x01);
        let set = OperatorSetId::new(&Address::repeat_byte(0x02), 0);
        let id = MembershipId::new(&op, &set, 1_700_000_000);
        assert_eq!(
            id.as_str(),
            format!("{}-{set}-1700000000", address_id(&op))
        );
    }

    #[test]
    fn relationship_ids_differ_by_timestamp() {
        let staker = Address::repeat_byte(0x03);
        let op = Address::repeat_byte(0x01);
        assert_ne!(DelegationId::new(&staker, &op, 1), DelegationId::new(&staker, &op, 2));
        assert_ne!(
            RegistrationId::new(&op, &staker, 1),
            RegistrationId::new(&op, &staker, 2)
        );
    }

    #[test]
    fn entity_key_display_names_kind() {
        let key = EntityKey::Operator(Address::repeat_byte(0x01));
        assert!(key.to_string().starts_with("operator:0x"));
        assert_eq!(key.kind(), EntityKind::Operator);
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = OperatorSetId::new(&Address::ZERO, 1);
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, format!("\"{id}\""));
    }
}
