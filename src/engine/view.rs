//! The merged view: an immutable precedence fold of module maps.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::flatten::FlatMap;
use crate::value::FlatValue;

/// Snapshot of the merged key space. Never mutated after publication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedView {
    values: FlatMap,
}

impl MergedView {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fold layers left to right; a later layer overwrites earlier ones key
    /// by key.
    pub fn fold<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Arc<FlatMap>>,
    {
        let mut values = FlatMap::new();
        for layer in layers {
            values.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Self { values }
    }

    /// Look up an already normalized key.
    pub fn get(&self, key: &str) -> Option<&FlatValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FlatValue)> {
        self.values.iter()
    }

    /// Sorted copy, convenient for display and serialization.
    pub fn to_sorted(&self) -> BTreeMap<String, FlatValue> {
        self.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}
