//! Bounded numeric state mutated by choice effects.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lower bound every clamped write respects.
pub const VALUE_MIN: f64 = 0.0;
/// Upper bound every clamped write respects.
pub const VALUE_MAX: f64 = 100.0;
/// What reading a variable that was never written returns.
pub const UNKNOWN_VARIABLE_DEFAULT: f64 = 0.0;

/// Clamp a value into `[VALUE_MIN, VALUE_MAX]`.
pub fn clamp(value: f64) -> f64 {
    value.clamp(VALUE_MIN, VALUE_MAX)
}

/// Name → number store for one playthrough.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    values: FxHashMap<String, f64>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self {
            values: FxHashMap::default(),
        }
    }

    /// Seed the store with initial values, written raw.
    pub fn from_initial<'a, I>(initial: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a f64)>,
    {
        let mut store = Self::new();
        for (name, value) in initial {
            store.set(name, *value);
        }
        store
    }

    /// Current value, or [`UNKNOWN_VARIABLE_DEFAULT`] for names never written.
    pub fn get(&self, name: &str) -> f64 {
        self.values
            .get(name)
            .copied()
            .unwrap_or(UNKNOWN_VARIABLE_DEFAULT)
    }

    /// Raw overwrite, no clamping.
    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    /// Add `delta` and clamp the result. Returns the new value.
    pub fn modify(&mut self, name: &str, delta: f64) -> f64 {
        let next = clamp(self.get(name) + delta);
        self.set(name, next);
        next
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// An immutable, ordered copy of the current values.
    pub fn snapshot(&self) -> VariableSnapshot {
        VariableSnapshot {
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }
}

/// Detached copy of the store handed to event consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableSnapshot {
    values: BTreeMap<String, f64>,
}

impl VariableSnapshot {
    pub fn get(&self, name: &str) -> f64 {
        self.values
            .get(name)
            .copied()
            .unwrap_or(UNKNOWN_VARIABLE_DEFAULT)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_reads_default() {
        let store = VariableStore::new();
        assert_eq!(store.get("Nobody"), UNKNOWN_VARIABLE_DEFAULT);
        assert!(!store.contains("Nobody"));
    }

    #[test]
    fn set_is_raw() {
        let mut store = VariableStore::new();
        store.set("Gold", 250.0);
        assert_eq!(store.get("Gold"), 250.0);
        store.set("Gold", -3.0);
        assert_eq!(store.get("Gold"), -3.0);
    }

    #[test]
    fn modify_clamps() {
        let mut store = VariableStore::new();
        store.set("Moral", 50.0);
        assert_eq!(store.modify("Moral", -60.0), 0.0);
        assert_eq!(store.modify("Moral", 500.0), 100.0);
        assert_eq!(store.modify("Fresh", 7.0), 7.0);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut store = VariableStore::new();
        store.set("Moral", 40.0);
        let snap = store.snapshot();
        store.modify("Moral", 10.0);
        assert_eq!(snap.get("Moral"), 40.0);
        assert_eq!(store.get("Moral"), 50.0);
    }

    #[test]
    fn snapshot_is_ordered() {
        let initial = BTreeMap::from([
            ("Zeal".to_string(), 1.0),
            ("Awe".to_string(), 2.0),
        ]);
        let store = VariableStore::from_initial(&initial);
        let snapshot = store.snapshot();
        let names: Vec<&str> = snapshot.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Awe", "Zeal"]);
        assert_eq!(store.snapshot().len(), 2);
    }
}
