//! Per-turn symbolic state.

use serde::{Deserialize, Serialize};

/// One turn's features, keyed by name, in insertion order.
///
/// Keys are unique. Re-inserting an existing key overwrites its weight in
/// place, so the key keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    entries: Vec<(String, f32)>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, weight: f32) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = weight,
            None => self.entries.push((key, weight)),
        }
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, w)| *w)
    }

    pub fn remove(&mut self, key: &str) -> Option<f32> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.entries.iter().map(|(k, w)| (k.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Order-insensitive view of the entries, used for hashing and equality
    /// of deduplicated examples.
    pub fn frozen(&self) -> FrozenState {
        let mut pairs: Vec<(String, u32)> = self
            .entries
            .iter()
            .map(|(k, w)| (k.clone(), w.to_bits()))
            .collect();
        pairs.sort();
        FrozenState(pairs)
    }
}

impl<K: Into<String>> FromIterator<(K, f32)> for State {
    fn from_iter<I: IntoIterator<Item = (K, f32)>>(iter: I) -> Self {
        let mut state = State::new();
        for (key, weight) in iter {
            state.insert(key, weight);
        }
        state
    }
}

/// Sorted key/weight-bits pairs of a [`State`].
///
/// Weights are compared by bit pattern, matching how they hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrozenState(Vec<(String, u32)>);
