//! Set reconciliation for member collections
//!
//! Subnet mappings, endpoints, allow-listed accounts and tags are all
//! collections whose members are identified by a key. Convergence is computed
//! by key presence: members only in the desired set are associated, members
//! only in the observed set are disassociated. Output order follows the input
//! order so repeated runs issue the same API calls in the same order.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Members to associate and disassociate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan<T> {
    pub associate: Vec<T>,
    pub disassociate: Vec<T>,
}

impl<T> ReconciliationPlan<T> {
    /// No call should be issued for an empty plan; some update endpoints
    /// reject no-op payloads.
    pub fn is_empty(&self) -> bool {
        self.associate.is_empty() && self.disassociate.is_empty()
    }
}

impl<T> Default for ReconciliationPlan<T> {
    fn default() -> Self {
        Self {
            associate: Vec::new(),
            disassociate: Vec::new(),
        }
    }
}

/// Compute the add-set and remove-set by key presence.
///
/// Members present on both sides are left untouched even if their non-key
/// attributes differ; see [`diff_with_drift`] for that. Duplicate keys are
/// not rejected.
pub fn diff<T, K, F>(desired: &[T], observed: &[T], key_of: F) -> ReconciliationPlan<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let observed_keys: HashSet<K> = observed.iter().map(&key_of).collect();
    let desired_keys: HashSet<K> = desired.iter().map(&key_of).collect();

    let associate = desired
        .iter()
        .filter(|item| !observed_keys.contains(&key_of(item)))
        .cloned()
        .collect();
    let disassociate = observed
        .iter()
        .filter(|item| !desired_keys.contains(&key_of(item)))
        .cloned()
        .collect();

    ReconciliationPlan {
        associate,
        disassociate,
    }
}

/// Projection from a member item to its identity within a collection
pub trait MemberKey {
    type Key: Eq + Hash;

    fn member_key(&self) -> Self::Key;
}

impl MemberKey for String {
    type Key = String;

    fn member_key(&self) -> String {
        self.clone()
    }
}

/// [`diff`] keyed by [`MemberKey`]
pub fn diff_members<T>(desired: &[T], observed: &[T]) -> ReconciliationPlan<T>
where
    T: Clone + MemberKey,
{
    diff(desired, observed, T::member_key)
}

/// Plan that also carries members whose attributes drifted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftPlan<T> {
    pub associate: Vec<T>,
    pub disassociate: Vec<T>,
    /// Desired members whose key is observed but whose attributes differ
    pub update: Vec<T>,
}

impl<T> DriftPlan<T> {
    pub fn is_empty(&self) -> bool {
        self.associate.is_empty() && self.disassociate.is_empty() && self.update.is_empty()
    }
}

/// [`diff`] plus an update set decided by `same`
pub fn diff_with_drift<T, K, F, E>(
    desired: &[T],
    observed: &[T],
    key_of: F,
    same: E,
) -> DriftPlan<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
    E: Fn(&T, &T) -> bool,
{
    let ReconciliationPlan {
        associate,
        disassociate,
    } = diff(desired, observed, &key_of);

    // later duplicates win, matching the presence semantics above
    let observed_by_key: HashMap<K, &T> = observed.iter().map(|o| (key_of(o), o)).collect();
    let update = desired
        .iter()
        .filter(|d| matches!(observed_by_key.get(&key_of(d)), Some(o) if !same(d, o)))
        .cloned()
        .collect();

    DriftPlan {
        associate,
        disassociate,
        update,
    }
}
