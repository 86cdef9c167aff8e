//! Structural hashing of (window, label) examples for deduplication.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use crate::state::{FrozenState, State};

type FrozenExample = (Vec<Option<FrozenState>>, String);

fn freeze(window: &[Option<State>]) -> Vec<Option<FrozenState>> {
    window.iter().map(|s| s.as_ref().map(State::frozen)).collect()
}

fn hash_frozen(frozen: &[Option<FrozenState>], action: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    frozen.hash(&mut hasher);
    action.hash(&mut hasher);
    hasher.finish()
}

/// Hash a window together with its label.
///
/// Window positions are order-sensitive; the features inside one state are
/// not. `None` positions hash as their own value.
pub fn hash_example(window: &[Option<State>], action: &str) -> u64 {
    hash_frozen(&freeze(window), action)
}

/// Tracks which examples were already emitted during one featurization run.
///
/// By default a hash match counts as a duplicate without comparing the
/// examples, so two distinct examples that collide keep only the first.
/// With `verify_collisions` the frozen examples are compared on a match.
#[derive(Debug, Default)]
pub struct ExampleDeduplicator {
    verify_collisions: bool,
    seen: HashSet<u64>,
    exact: HashMap<u64, Vec<FrozenExample>>,
}

impl ExampleDeduplicator {
    pub fn new(verify_collisions: bool) -> Self {
        Self {
            verify_collisions,
            ..Default::default()
        }
    }

    /// Record an example; returns `false` when it was seen before.
    pub fn insert(&mut self, window: &[Option<State>], action: &str) -> bool {
        let frozen = freeze(window);
        let hashed = hash_frozen(&frozen, action);

        if !self.verify_collisions {
            return self.seen.insert(hashed);
        }

        let bucket = self.exact.entry(hashed).or_default();
        if bucket
            .iter()
            .any(|(states, label)| *states == frozen && label == action)
        {
            return false;
        }
        bucket.push((frozen, action.to_string()));
        true
    }

    pub fn len(&self) -> usize {
        if self.verify_collisions {
            self.exact.values().map(Vec::len).sum()
        } else {
            self.seen.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
