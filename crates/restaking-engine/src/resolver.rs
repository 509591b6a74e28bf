//! Identity resolution and get-or-create.
//!
//! The [`Resolver`] is the only place entities enter a step. It turns a key
//! into a staged working copy, loading from the store on first touch and
//! reusing the staged copy afterwards, so asking for the same entity twice
//! in one step never creates a duplicate.
//!
//! Two families of accessors exist:
//!
//! - `operator`, `operator_set`, ... return `None` when the entity is not
//!   stored. Reconcilers use these for *required* parents.
//! - `get_or_create_*` zero-initialize missing entities. Reconcilers use
//!   these for *weak* references (operators, AVSs, strategies, stakers)
//!   that have no canonical creation event.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use restaking_store::{EntityStore, StoreError, WithdrawalIndexEntry};
use restaking_types::{
    Address, Avs, B256, DerivedRecord, EigenPod, EntityKey, MembershipId, Operator, OperatorSet,
    OperatorSetId, OperatorSetMembership, Staker, Strategy,
};

use crate::arena::{StepArena, Staged};

/// Stage an existing entity, loading it on first touch.
fn stage<'m, K: Ord, T: Clone + PartialEq>(
    map: &'m mut BTreeMap<K, Staged<T>>,
    key: K,
    fetch: impl FnOnce(&K) -> Result<Option<T>, StoreError>,
) -> Result<Option<&'m mut T>, StoreError> {
    match map.entry(key) {
        Entry::Occupied(slot) => Ok(Some(&mut slot.into_mut().after)),
        Entry::Vacant(slot) => match fetch(slot.key())? {
            Some(found) => Ok(Some(&mut slot.insert(Staged::loaded(found)).after)),
            None => Ok(None),
        },
    }
}

/// Stage an entity, creating it zero-initialized when it is not stored.
fn stage_or_create<'m, K: Ord, T: Clone + PartialEq>(
    map: &'m mut BTreeMap<K, Staged<T>>,
    key: K,
    fetch: impl FnOnce(&K) -> Result<Option<T>, StoreError>,
    create: impl FnOnce(&K) -> T,
) -> Result<&'m mut T, StoreError> {
    match map.entry(key) {
        Entry::Occupied(slot) => Ok(&mut slot.into_mut().after),
        Entry::Vacant(slot) => {
            let staged = match fetch(slot.key())? {
                Some(found) => Staged::loaded(found),
                None => Staged::created(create(slot.key())),
            };
            Ok(&mut slot.insert(staged).after)
        }
    }
}

/// Stages entities for one event against a backing store.
pub struct Resolver<'a> {
    store: &'a dyn EntityStore,
    arena: StepArena,
}

impl<'a> Resolver<'a> {
    /// Start a fresh step over `store`.
    pub fn new(store: &'a dyn EntityStore) -> Self {
        Self {
            store,
            arena: StepArena::default(),
        }
    }

    /// The backing store, for read-only lookups outside the arena.
    pub const fn store(&self) -> &'a dyn EntityStore {
        self.store
    }

    /// Finish the step and hand over the staged state.
    pub fn into_arena(self) -> StepArena {
        self.arena
    }

    // -----------------------------------------------------------------------
    // Required lookups
    // -----------------------------------------------------------------------

    /// Stage an existing operator.
    pub fn operator(&mut self, address: Address) -> Result<Option<&mut Operator>, StoreError> {
        let store = self.store;
        stage(&mut self.arena.operators, address, |a| store.operator(a))
    }

    /// Stage an existing AVS.
    pub fn avs(&mut self, address: Address) -> Result<Option<&mut Avs>, StoreError> {
        let store = self.store;
        stage(&mut self.arena.avss, address, |a| store.avs(a))
    }

    /// Stage an existing operator set.
    pub fn operator_set(&mut self, id: &OperatorSetId) -> Result<Option<&mut OperatorSet>, StoreError> {
        let store = self.store;
        stage(&mut self.arena.operator_sets, id.clone(), |k| store.operator_set(k))
    }

    /// Stage an existing staker.
    pub fn staker(&mut self, address: Address) -> Result<Option<&mut Staker>, StoreError> {
        let store = self.store;
        stage(&mut self.arena.stakers, address, |a| store.staker(a))
    }

    /// Stage an existing pod by pod address.
    pub fn eigen_pod(&mut self, address: Address) -> Result<Option<&mut EigenPod>, StoreError> {
        let store = self.store;
        stage(&mut self.arena.pods, address, |a| store.eigen_pod(a))
    }

    /// Stage the pod owned by `owner`, if one was deployed.
    pub fn pod_of_owner(&mut self, owner: Address) -> Result<Option<&mut EigenPod>, StoreError> {
        let staged = self
            .arena
            .pods
            .values()
            .find(|s| s.after.owner == owner)
            .map(|s| s.after.address);
        let address = match staged {
            Some(address) => Some(address),
            None => self.store.pod_of_owner(&owner)?,
        };
        match address {
            Some(address) => self.eigen_pod(address),
            None => Ok(None),
        }
    }

    /// Stage an existing membership row by id, open or closed.
    pub fn membership(&mut self, id: &MembershipId) -> Result<Option<&mut OperatorSetMembership>, StoreError> {
        let store = self.store;
        stage(&mut self.arena.memberships, id.clone(), |k| store.membership(k))
    }

    /// Stage the open membership of `operator` in `operator_set`, if any.
    pub fn open_membership(
        &mut self,
        operator: Address,
        operator_set: &OperatorSetId,
    ) -> Result<Option<&mut OperatorSetMembership>, StoreError> {
        let staged = self
            .arena
            .memberships
            .values()
            .find(|s| {
                s.after.operator == operator
                    && &s.after.operator_set == operator_set
                    && s.after.is_active()
            })
            .map(|s| s.after.id.clone());
        let id = match staged {
            Some(id) => Some(id),
            None => self
                .store
                .open_membership(&operator, operator_set)?
                .map(|m| m.id),
        };
        match id {
            Some(id) => {
                // A row closed earlier in this step still shows as open in the store index.
                let store = self.store;
                Ok(stage(&mut self.arena.memberships, id, |k| store.membership(k))?
                    .filter(|m| m.is_active()))
            }
            None => Ok(None),
        }
    }

    /// Whether the entity named by `key` exists, staging it if so.
    pub fn exists(&mut self, key: &EntityKey) -> Result<bool, StoreError> {
        Ok(match key {
            EntityKey::Operator(a) => self.operator(*a)?.is_some(),
            EntityKey::Avs(a) => self.avs(*a)?.is_some(),
            EntityKey::OperatorSet(id) => self.operator_set(id)?.is_some(),
            EntityKey::Strategy(a) => {
                let store = self.store;
                stage(&mut self.arena.strategies, *a, |k| store.strategy(k))?.is_some()
            }
            EntityKey::Staker(a) => self.staker(*a)?.is_some(),
            EntityKey::EigenPod(a) => self.eigen_pod(*a)?.is_some(),
            EntityKey::Membership(id) => {
                let store = self.store;
                stage(&mut self.arena.memberships, id.clone(), |k| store.membership(k))?.is_some()
            }
        })
    }

    /// Staker that queued the withdrawal with root `root`, if known.
    pub fn withdrawal_staker(&self, root: &B256) -> Result<Option<Address>, StoreError> {
        if let Some(entry) = self.arena.withdrawals.iter().find(|w| &w.root == root) {
            return Ok(Some(entry.staker));
        }
        self.store.withdrawal_staker(root)
    }

    // -----------------------------------------------------------------------
    // Get-or-create
    // -----------------------------------------------------------------------

    /// Stage an operator, zero-initializing it if unseen.
    pub fn get_or_create_operator(&mut self, address: Address, timestamp: u64) -> Result<&mut Operator, StoreError> {
        let store = self.store;
        stage_or_create(
            &mut self.arena.operators,
            address,
            |a| store.operator(a),
            |a| Operator::new(*a, timestamp),
        )
    }

    /// Stage an AVS, zero-initializing it if unseen.
    pub fn get_or_create_avs(&mut self, address: Address, timestamp: u64) -> Result<&mut Avs, StoreError> {
        let store = self.store;
        stage_or_create(
            &mut self.arena.avss,
            address,
            |a| store.avs(a),
            |a| Avs::new(*a, timestamp),
        )
    }

    /// Stage a strategy, zero-initializing it if unseen.
    pub fn get_or_create_strategy(&mut self, address: Address, timestamp: u64) -> Result<&mut Strategy, StoreError> {
        let store = self.store;
        stage_or_create(
            &mut self.arena.strategies,
            address,
            |a| store.strategy(a),
            |a| Strategy::new(*a, timestamp),
        )
    }

    /// Stage a staker, zero-initializing it if unseen.
    pub fn get_or_create_staker(&mut self, address: Address, timestamp: u64) -> Result<&mut Staker, StoreError> {
        let store = self.store;
        stage_or_create(
            &mut self.arena.stakers,
            address,
            |a| store.staker(a),
            |a| Staker::new(*a, timestamp),
        )
    }

    // -----------------------------------------------------------------------
    // Creation of keyed entities
    // -----------------------------------------------------------------------

    /// Stage a newly created operator set. Returns `false` if the id is
    /// already taken.
    pub fn create_operator_set(&mut self, set: OperatorSet) -> Result<bool, StoreError> {
        if self.operator_set(&set.id)?.is_some() {
            return Ok(false);
        }
        self.arena.operator_sets.insert(set.id.clone(), Staged::created(set));
        Ok(true)
    }

    /// Stage a newly deployed pod. Returns `false` if the pod address is
    /// already taken.
    pub fn create_eigen_pod(&mut self, pod: EigenPod) -> Result<bool, StoreError> {
        if self.eigen_pod(pod.address)?.is_some() {
            return Ok(false);
        }
        self.arena.pods.insert(pod.address, Staged::created(pod));
        Ok(true)
    }

    /// Stage a newly opened membership row. Returns `false` if the id is
    /// already taken.
    pub fn create_membership(&mut self, membership: OperatorSetMembership) -> Result<bool, StoreError> {
        let id: MembershipId = membership.id.clone();
        if self.exists(&EntityKey::Membership(id.clone()))? {
            return Ok(false);
        }
        self.arena.memberships.insert(id, Staged::created(membership));
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Appends
    // -----------------------------------------------------------------------

    /// Queue a derived record.
    pub fn append(&mut self, record: DerivedRecord) {
        self.arena.records.push(record);
    }

    /// Queue a withdrawal-root index entry.
    pub fn index_withdrawal(&mut self, root: B256, staker: Address) {
        self.arena.withdrawals.push(WithdrawalIndexEntry { root, staker });
    }
}
