//! Tracker featurizer: trackers in, training arrays out.

use std::path::{Path, PathBuf};

use ndarray::Array3;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::batch::{encode_labels, encode_windows, true_length, TrainingData};
use crate::domain::Domain;
use crate::encoder::StateEncoder;
use crate::error::{FeaturizerError, Result};
use crate::sequence::compress_repeated_intents;
use crate::state::State;
use crate::tracker::Tracker;
use crate::windowing::{TrainingExamples, WindowingStrategy};

/// File name of a persisted featurizer inside its directory.
pub const FEATURIZER_FILE: &str = "featurizer.json";

/// Turns dialogue trackers into padded numeric arrays.
///
/// The state encoder is calibrated against the domain on every training call;
/// inference reuses that calibration, so a freshly constructed featurizer
/// must be trained (or loaded) before `create_inputs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerFeaturizer<E> {
    state_encoder: E,
    strategy: WindowingStrategy,
    #[serde(default)]
    use_intent_probabilities: bool,
}

impl<E> TrackerFeaturizer<E>
where
    E: StateEncoder + Sync,
{
    pub fn new(state_encoder: E, strategy: WindowingStrategy, use_intent_probabilities: bool) -> Self {
        Self {
            state_encoder,
            strategy,
            use_intent_probabilities,
        }
    }

    /// Featurizer emitting one fully labelled example per dialogue.
    pub fn full_dialogue(state_encoder: E) -> Self {
        Self::new(state_encoder, WindowingStrategy::full_dialogue(), false)
    }

    /// Featurizer emitting one example per action over a fixed history.
    pub fn max_history(state_encoder: E, max_history: Option<usize>, remove_duplicates: bool) -> Self {
        Self::new(
            state_encoder,
            WindowingStrategy::max_history(max_history, remove_duplicates),
            false,
        )
    }

    pub fn state_encoder(&self) -> &E {
        &self.state_encoder
    }

    pub fn strategy(&self) -> &WindowingStrategy {
        &self.strategy
    }

    pub fn use_intent_probabilities(&self) -> bool {
        self.use_intent_probabilities
    }

    /// Windows and labels before encoding, with repeated intents compressed.
    pub fn training_states_and_actions<T, D>(
        &mut self,
        trackers: &[T],
        domain: &D,
    ) -> Result<TrainingExamples>
    where
        T: Tracker + Sync,
        D: Domain + Sync,
    {
        let mut examples = self.strategy.training_examples(trackers, domain)?;
        compress_repeated_intents(&mut examples.states);
        Ok(examples)
    }

    /// Windows for inference, one per tracker, in tracker order.
    ///
    /// Repeated intents are kept; compression only applies to training data.
    pub fn prediction_states<T, D>(&self, trackers: &[T], domain: &D) -> Vec<Vec<Option<State>>>
    where
        T: Tracker + Sync,
        D: Domain + Sync,
    {
        self.strategy
            .predict_examples(trackers, domain, self.use_intent_probabilities)
    }

    /// Create training data: X, y and the unpadded length of every example.
    pub fn featurize_trackers<T, D>(&mut self, trackers: &[T], domain: &D) -> Result<TrainingData>
    where
        T: Tracker + Sync,
        D: Domain + Sync,
    {
        if trackers.is_empty() {
            return Err(FeaturizerError::EmptyBatch);
        }

        self.state_encoder.prepare(domain);
        let examples = self.training_states_and_actions(trackers, domain)?;

        let true_lengths = examples.states.iter().map(|w| true_length(w)).collect();
        let states = self.pad_batch(examples.states);
        let actions = self.pad_batch(
            examples
                .actions
                .into_iter()
                .map(|labels| labels.into_iter().map(Some).collect())
                .collect(),
        );

        let x = encode_windows(&states, &self.state_encoder, self.strategy.min_turns())?;
        let y = encode_labels(&actions, domain, self.strategy.labels_last_turn_only())?;
        debug!(
            "Featurized {} trackers into X {:?} and y {:?}",
            trackers.len(),
            x.shape(),
            y.shape()
        );

        Ok(TrainingData { x, y, true_lengths })
    }

    /// Create X for prediction.
    pub fn create_inputs<T, D>(&self, trackers: &[T], domain: &D) -> Result<Array3<f32>>
    where
        T: Tracker + Sync,
        D: Domain + Sync,
    {
        let windows = self.prediction_states(trackers, domain);
        let windows = self.pad_batch(windows);
        encode_windows(&windows, &self.state_encoder, self.strategy.min_turns())
    }

    /// A single sequence (prediction, or one story) is never padded.
    fn pad_batch<S: Clone>(&self, sequences: Vec<Vec<Option<S>>>) -> Vec<Vec<Option<S>>> {
        if sequences.len() <= 1 {
            return sequences;
        }
        let target = self.strategy.padded_len(&sequences);
        sequences
            .into_iter()
            .map(|seq| self.strategy.pad(seq, target))
            .collect()
    }
}

impl<E> TrackerFeaturizer<E>
where
    E: StateEncoder + Sync + Serialize + DeserializeOwned,
{
    /// Write the featurizer, calibrated encoder included, into `path`.
    pub fn persist(&self, path: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(path)?;
        let featurizer_file = path.join(FEATURIZER_FILE);
        std::fs::write(&featurizer_file, serde_json::to_string_pretty(self)?)?;
        Ok(featurizer_file)
    }

    /// Load a featurizer persisted with [`TrackerFeaturizer::persist`].
    ///
    /// Returns `Ok(None)` when no featurizer file exists under `path`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let featurizer_file = path.join(FEATURIZER_FILE);
        if !featurizer_file.is_file() {
            error!(
                "Couldn't load featurizer for policy. File '{}' doesn't exist.",
                featurizer_file.display()
            );
            return Ok(None);
        }

        let text = std::fs::read_to_string(&featurizer_file)?;
        Ok(Some(serde_json::from_str(&text)?))
    }
}
