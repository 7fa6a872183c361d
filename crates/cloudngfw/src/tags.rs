//! Tag bags and named attributes carried inside them
//!
//! Some remote objects store a required attribute as a reserved tag (the
//! firewall display name lives in the `FirewallName` tag). The attribute can
//! be declared as a first-class field, as a tag, or both; the resolver keeps
//! a single source of truth and rejects disagreeing values.

use crate::diff::{MemberKey, diff_with_drift};
use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved tag holding a firewall's display name
pub const FIREWALL_NAME_TAG: &str = "FirewallName";

/// List form of a tag, as exchanged with the remote API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl MemberKey for Tag {
    type Key = String;

    fn member_key(&self) -> String {
        self.key.clone()
    }
}

/// Unordered tag-name → tag-value map with unique keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagBag(BTreeMap<String, String>);

impl TagBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from list form. When a key repeats, the last value wins.
    pub fn from_tags<I: IntoIterator<Item = Tag>>(tags: I) -> Self {
        Self(tags.into_iter().map(|t| (t.key, t.value)).collect())
    }

    /// List form, ordered by key
    pub fn to_tags(&self) -> Vec<Tag> {
        self.0
            .iter()
            .map(|(k, v)| Tag::new(k.clone(), v.clone()))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Tags to write and keys to delete so that `observed` becomes `self`
    pub fn changes_from(&self, observed: &TagBag) -> TagChanges {
        let plan = diff_with_drift(
            &self.to_tags(),
            &observed.to_tags(),
            Tag::member_key,
            |a, b| a.value == b.value,
        );
        let mut set = plan.associate;
        set.extend(plan.update);
        set.sort_by(|a, b| a.key.cmp(&b.key));
        TagChanges {
            set,
            remove: plan.disassociate.into_iter().map(|t| t.key).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Tag writes and deletes needed to converge a tag bag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagChanges {
    /// New tags and tags whose value changed
    pub set: Vec<Tag>,
    pub remove: Vec<String>,
}

impl TagChanges {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// Merge a named attribute supplied as a field and/or as a reserved tag.
///
/// Both present: they must be equal. One present: the result carries it under
/// `reserved_name`. Neither: `MissingRequiredAttribute`. An empty explicit
/// value counts as absent.
pub fn resolve_named_attribute(
    bag: &TagBag,
    explicit_value: Option<&str>,
    reserved_name: &str,
) -> Result<TagBag> {
    let explicit_value = explicit_value.filter(|v| !v.is_empty());

    match (bag.get(reserved_name), explicit_value) {
        (Some(tagged), Some(explicit)) if tagged != explicit => {
            Err(CloudError::AttributeConflict {
                name: reserved_name.to_string(),
                explicit: explicit.to_string(),
                tagged: tagged.to_string(),
            })
        }
        (Some(_), _) => Ok(bag.clone()),
        (None, Some(explicit)) => {
            let mut merged = bag.clone();
            merged.insert(reserved_name, explicit);
            Ok(merged)
        }
        (None, None) => Err(CloudError::MissingRequiredAttribute(
            reserved_name.to_string(),
        )),
    }
}

/// Read back a named attribute stored as a reserved tag
pub fn extract_named_attribute(bag: &TagBag, reserved_name: &str) -> Result<String> {
    bag.get(reserved_name)
        .map(str::to_string)
        .ok_or_else(|| CloudError::MissingRequiredAttribute(reserved_name.to_string()))
}
