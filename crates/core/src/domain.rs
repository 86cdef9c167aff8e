//! Domain schema: actions and the input-state vocabulary.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{ENTITY_PREFIX, INTENT_PREFIX, PREV_PREFIX, SLOT_PREFIX};

/// Read-only view of the dialogue schema.
///
/// Implementors provide the action vocabulary with stable indices and the
/// full set of state keys a tracker can produce.
pub trait Domain {
    /// Total number of actions.
    fn num_actions(&self) -> usize;

    /// Index of an action, `None` when the name is unknown.
    fn index_for_action(&self, action_name: &str) -> Option<usize>;

    /// Action names ordered by index.
    fn action_names(&self) -> &[String];

    /// Every state key the domain can produce.
    fn input_states(&self) -> &[String];
}

// Blanket implementation for references to Domains
impl<D: Domain + ?Sized> Domain for &D {
    fn num_actions(&self) -> usize {
        (*self).num_actions()
    }

    fn index_for_action(&self, action_name: &str) -> Option<usize> {
        (*self).index_for_action(action_name)
    }

    fn action_names(&self) -> &[String] {
        (*self).action_names()
    }

    fn input_states(&self) -> &[String] {
        (*self).input_states()
    }
}

/// Serialized shape of a domain file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DomainSpec {
    #[serde(default)]
    pub intents: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub slots: Vec<String>,
    pub actions: Vec<String>,
}

/// A domain fixed at construction.
#[derive(Debug, Clone)]
pub struct StaticDomain {
    spec: DomainSpec,
    action_index: HashMap<String, usize>,
    input_states: Vec<String>,
}

impl StaticDomain {
    pub fn new(spec: DomainSpec) -> Self {
        let action_index = spec
            .actions
            .iter()
            .enumerate()
            .map(|(i, a)| (a.clone(), i))
            .collect();

        let input_states = spec
            .intents
            .iter()
            .map(|i| format!("{INTENT_PREFIX}{i}"))
            .chain(spec.entities.iter().map(|e| format!("{ENTITY_PREFIX}{e}")))
            .chain(spec.slots.iter().map(|s| format!("{SLOT_PREFIX}{s}_0")))
            .chain(spec.actions.iter().map(|a| format!("{PREV_PREFIX}{a}")))
            .collect();

        Self {
            spec,
            action_index,
            input_states,
        }
    }

    /// Load a domain from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let spec: DomainSpec = serde_json::from_str(&text)?;
        Ok(Self::new(spec))
    }

    pub fn spec(&self) -> &DomainSpec {
        &self.spec
    }
}

impl Domain for StaticDomain {
    fn num_actions(&self) -> usize {
        self.spec.actions.len()
    }

    fn index_for_action(&self, action_name: &str) -> Option<usize> {
        self.action_index.get(action_name).copied()
    }

    fn action_names(&self) -> &[String] {
        &self.spec.actions
    }

    fn input_states(&self) -> &[String] {
        &self.input_states
    }
}
