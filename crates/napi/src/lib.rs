//! Node.js bindings for the dialogue featurizer.
//!
//! Only the inference path is exposed: a featurizer trained and persisted by
//! the CLI is loaded here and turns live conversations into model inputs.

use std::path::Path;

use napi::bindgen_prelude::*;
use napi_derive::napi;

use dialogue_featurizer_core::{
    action_as_one_hot as core_action_as_one_hot, load_session, DialogueTracker, Event,
    SingleStateEncoder, StateEncoder, StaticDomain, TrackerFeaturizer,
};

fn to_napi_error(err: impl std::fmt::Display) -> Error {
    Error::from_reason(err.to_string())
}

fn load_domain(domain_path: &str) -> Result<StaticDomain> {
    StaticDomain::from_path(Path::new(domain_path)).map_err(to_napi_error)
}

/// A dense batch of model inputs in row-major order.
#[napi(object)]
pub struct InputBatch {
    /// batch x turn x feature.
    pub shape: Vec<u32>,
    pub data: Vec<f64>,
}

/// A featurizer loaded from disk.
#[napi]
pub struct DialogueFeaturizer {
    inner: TrackerFeaturizer<SingleStateEncoder>,
}

#[napi]
impl DialogueFeaturizer {
    /// Load a persisted featurizer.
    ///
    /// @param path - Directory the featurizer was persisted into.
    /// @returns The featurizer, or null if no featurizer file exists there.
    #[napi]
    pub fn load(path: String) -> Result<Option<DialogueFeaturizer>> {
        let inner = TrackerFeaturizer::<SingleStateEncoder>::load(Path::new(&path))
            .map_err(to_napi_error)?;
        Ok(inner.map(|inner| DialogueFeaturizer { inner }))
    }

    /// Name of the windowing strategy the featurizer was trained with.
    #[napi(getter)]
    pub fn strategy(&self) -> String {
        self.inner.strategy().name().to_string()
    }

    /// Length of one encoded turn.
    #[napi(getter)]
    pub fn feature_dim(&self) -> Result<u32> {
        let dim = self
            .inner
            .state_encoder()
            .vocabulary_size()
            .map_err(to_napi_error)?;
        Ok(dim as u32)
    }

    /// Featurize recorded session files for prediction.
    ///
    /// @param sessionPaths - Session CSV files, one conversation each.
    /// @param domainPath - Domain JSON file used at training time.
    #[napi]
    pub fn create_inputs(&self, session_paths: Vec<String>, domain_path: String) -> Result<InputBatch> {
        let domain = load_domain(&domain_path)?;
        let trackers = session_paths
            .iter()
            .map(|p| load_session(Path::new(p)))
            .collect::<dialogue_featurizer_core::Result<Vec<_>>>()
            .map_err(to_napi_error)?;
        self.featurize(&trackers, &domain)
    }

    /// Featurize one live conversation given as a JSON event list.
    ///
    /// @param senderId - Conversation id.
    /// @param eventsJson - JSON array of events, e.g. `[{"event": "action_executed", "action_name": "action_listen"}]`.
    /// @param domainPath - Domain JSON file used at training time.
    #[napi]
    pub fn create_inputs_from_events(
        &self,
        sender_id: String,
        events_json: String,
        domain_path: String,
    ) -> Result<InputBatch> {
        let domain = load_domain(&domain_path)?;
        let events: Vec<Event> = serde_json::from_str(&events_json).map_err(to_napi_error)?;
        self.featurize(&[DialogueTracker::new(sender_id, events)], &domain)
    }

    fn featurize(&self, trackers: &[DialogueTracker], domain: &StaticDomain) -> Result<InputBatch> {
        let x = self
            .inner
            .create_inputs(trackers, domain)
            .map_err(to_napi_error)?;
        Ok(InputBatch {
            shape: x.shape().iter().map(|&d| d as u32).collect(),
            data: x.iter().map(|&v| v as f64).collect(),
        })
    }
}

/// One-hot encode an action against a domain.
///
/// @param action - Action name, or null for the all-sentinel padding row.
/// @param domainPath - Domain JSON file.
#[napi]
pub fn action_as_one_hot(action: Option<String>, domain_path: String) -> Result<Vec<i32>> {
    let domain = load_domain(&domain_path)?;
    let one_hot = core_action_as_one_hot(action.as_deref(), &domain).map_err(to_napi_error)?;
    Ok(one_hot.to_vec())
}
