//! Single writer facet
//!
//! Every key has at most one value. A second capability may repeat an
//! identical entry; a differing entry is a conflict.

use crate::keyed::Keyed;
use crate::strategy::{Contributor, FacetStrategy, MergeError};
use accrete_capability::CapabilityId;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

/// Entry plus the capabilities that declared it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attributed<T> {
    /// Declared entry
    #[serde(flatten)]
    pub item: T,
    /// Declaring capabilities in id order, independent of merge order
    #[serde(deserialize_with = "non_empty_declarers")]
    pub declared_by: BTreeSet<CapabilityId>,
}

fn non_empty_declarers<'de, D>(deserializer: D) -> Result<BTreeSet<CapabilityId>, D::Error>
where
    D: Deserializer<'de>,
{
    let declared_by = BTreeSet::<CapabilityId>::deserialize(deserializer)?;
    if declared_by.is_empty() {
        return Err(serde::de::Error::custom(
            "declared_by must name at least one capability",
        ));
    }
    Ok(declared_by)
}

impl<T> Attributed<T> {
    /// Create entry owned by `owner`
    #[inline]
    #[must_use]
    pub fn new(owner: CapabilityId, item: T) -> Self {
        Self {
            item,
            declared_by: BTreeSet::from([owner]),
        }
    }

    /// Declaring capability reported in conflicts (lowest id)
    #[must_use]
    pub fn owner(&self) -> Option<&CapabilityId> {
        self.declared_by.first()
    }
}

/// Keyed facet with one writer per key
///
/// # Characteristics
/// - Order independent: the final content does not depend on merge order
/// - Identical redeclarations collapse into one entry
/// - Differing redeclarations are rejected, never overwritten
#[derive(Debug, Clone)]
pub struct SingleWriterFacet<T: Keyed> {
    name: &'static str,
    entries: BTreeMap<T::Key, Attributed<T>>,
}

impl<T: Keyed> SingleWriterFacet<T> {
    /// Create empty facet
    #[inline]
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: BTreeMap::new(),
        }
    }

    /// Rebuild facet from attributed entries
    ///
    /// Entries sharing a key must be identical; their declarers are joined.
    ///
    /// # Errors
    /// Returns the facet's conflict error if two entries share a key but differ
    pub fn from_entries(
        name: &'static str,
        entries: impl IntoIterator<Item = Attributed<T>>,
    ) -> Result<Self, MergeError> {
        let mut facet = Self::new(name);
        for entry in entries {
            match facet.entries.entry(entry.item.key()) {
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
                Entry::Occupied(mut slot) => {
                    let existing = slot.get_mut();
                    if existing.item != entry.item {
                        // Deserialized entries always name a declarer
                        let existing_owner = existing.owner().or(entry.owner());
                        let incoming_owner = entry.owner().or(existing.owner());
                        if let (Some(existing_owner), Some(incoming_owner)) =
                            (existing_owner, incoming_owner)
                        {
                            return Err(T::conflict(
                                existing_owner,
                                &existing.item,
                                incoming_owner,
                                &entry.item,
                            ));
                        }
                    }
                    existing.declared_by.extend(entry.declared_by);
                }
            }
        }
        Ok(facet)
    }

    /// Entry for `key`
    #[must_use]
    pub fn get(&self, key: &T::Key) -> Option<&Attributed<T>> {
        self.entries.get(key)
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = &Attributed<T>> {
        self.entries.values()
    }

    /// Items in key order
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(|e| &e.item)
    }

    /// Number of keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Keyed> PartialEq for SingleWriterFacet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<T: Keyed> FacetStrategy for SingleWriterFacet<T> {
    type Item = T;

    fn validate(&self, contributor: &Contributor, items: &[T]) -> Result<(), MergeError> {
        let mut pending: BTreeMap<T::Key, &T> = BTreeMap::new();

        for item in items {
            let key = item.key();

            if let Some(existing) = self.entries.get(&key) {
                if existing.item != *item {
                    let owner = existing.owner().unwrap_or(&contributor.id);
                    return Err(T::conflict(owner, &existing.item, &contributor.id, item));
                }
            }

            // A capability can also contradict itself
            if let Some(previous) = pending.insert(key, item) {
                if previous != item {
                    return Err(T::conflict(&contributor.id, previous, &contributor.id, item));
                }
            }
        }

        Ok(())
    }

    fn compose(&mut self, contributor: &Contributor, items: &[T]) {
        for item in items {
            self.entries
                .entry(item.key())
                .and_modify(|entry| {
                    entry.declared_by.insert(contributor.id.clone());
                })
                .or_insert_with(|| Attributed::new(contributor.id.clone(), item.clone()));
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
