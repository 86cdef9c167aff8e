//! Single-state encoders: one turn's [`State`] to a fixed-length vector.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use ndarray::{Array1, Array2};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Domain;
use crate::error::{FeaturizerError, Result};
use crate::state::State;
use crate::{CLS_TOKEN, SENTINEL};

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

/// Trait for state encoding.
///
/// An encoder starts uncalibrated; `prepare` fixes its vocabulary from the
/// domain. Encoding before that fails with [`FeaturizerError::NotPrepared`].
pub trait StateEncoder {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Calibrate against the domain's input states. Calling it again with the
    /// same domain yields the same vocabulary.
    fn prepare(&mut self, domain: &dyn Domain);

    fn is_prepared(&self) -> bool;

    /// Length of every vector returned by `encode`.
    fn vocabulary_size(&self) -> Result<usize>;

    /// Encode one state. `None` encodes to the all -1 sentinel.
    fn encode(&self, state: Option<&State>) -> Result<Array1<f32>>;

    /// Matrix whose rows are the one-hot encodings of every domain action.
    fn create_encoded_all_actions(&self, domain: &dyn Domain) -> Result<Array2<i32>> {
        let n = domain.num_actions();
        let mut matrix = Array2::zeros((n, n));
        for (row, action) in domain.action_names().iter().enumerate() {
            matrix
                .row_mut(row)
                .assign(&action_as_one_hot(Some(action), domain)?);
        }
        Ok(matrix)
    }

    fn sentinel(&self) -> Result<Array1<f32>> {
        Ok(Array1::from_elem(self.vocabulary_size()?, SENTINEL as f32))
    }
}

/// Encode a system action as a one-hot vector over the domain's actions.
///
/// `None` yields the all -1 sentinel of the same length.
pub fn action_as_one_hot(action: Option<&str>, domain: &dyn Domain) -> Result<Array1<i32>> {
    let n = domain.num_actions();
    let Some(action) = action else {
        return Ok(Array1::from_elem(n, SENTINEL));
    };

    let idx = domain
        .index_for_action(action)
        .ok_or_else(|| FeaturizerError::UnknownAction {
            action: action.to_string(),
        })?;
    let mut y = Array1::zeros(n);
    y[idx] = 1;
    Ok(y)
}

/// Bag-of-words encoder over the tokens of state keys.
///
/// Keys are split on the delimiter, so `prev_utter_greet` contributes the
/// tokens `prev`, `utter` and `greet`. The vocabulary holds a `__cls__`
/// column, but an encoded state is the sentence-level row that aggregates
/// the key tokens only, so that column stays zero. Weights are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BowStateEncoder {
    delimiter: char,
    vocabulary: Option<Vocabulary>,
}

/// Token to column index, sorted by token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    tokens: HashMap<String, usize>,
}

impl Vocabulary {
    fn from_keys<'a>(keys: impl Iterator<Item = &'a str>, delimiter: char) -> Self {
        let mut sorted: BTreeSet<String> = keys.flat_map(|k| tokenize(k, delimiter)).collect();
        sorted.insert(CLS_TOKEN.to_string());
        let tokens = sorted.into_iter().enumerate().map(|(i, t)| (t, i)).collect();
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.tokens.get(token).copied()
    }
}

fn tokenize(key: &str, delimiter: char) -> Vec<String> {
    let text = key.replace(delimiter, " ");
    TOKEN_RE
        .find_iter(&text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

impl Default for BowStateEncoder {
    fn default() -> Self {
        Self {
            delimiter: '_',
            vocabulary: None,
        }
    }
}

impl BowStateEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calibrate from states seen in training data instead of the domain.
    pub fn prepare_from_states<'a>(&mut self, states: impl IntoIterator<Item = &'a State>) {
        let keys: Vec<&str> = states.into_iter().flat_map(|s| s.keys()).collect();
        self.vocabulary = Some(Vocabulary::from_keys(keys.into_iter(), self.delimiter));
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.vocabulary.as_ref()
    }

    fn calibrated(&self) -> Result<&Vocabulary> {
        self.vocabulary
            .as_ref()
            .ok_or(FeaturizerError::NotPrepared { encoder: self.name() })
    }
}

impl StateEncoder for BowStateEncoder {
    fn name(&self) -> &'static str {
        "bow"
    }

    fn prepare(&mut self, domain: &dyn Domain) {
        let keys = domain.input_states().iter().map(String::as_str);
        self.vocabulary = Some(Vocabulary::from_keys(keys, self.delimiter));
    }

    fn is_prepared(&self) -> bool {
        self.vocabulary.is_some()
    }

    fn vocabulary_size(&self) -> Result<usize> {
        Ok(self.calibrated()?.len())
    }

    fn encode(&self, state: Option<&State>) -> Result<Array1<f32>> {
        let vocabulary = self.calibrated()?;
        let Some(state) = state else {
            return self.sentinel();
        };

        let mut x = Array1::zeros(vocabulary.len());
        let tokens = state.keys().flat_map(|k| tokenize(k, self.delimiter));
        for token in tokens {
            if let Some(idx) = vocabulary.index_of(&token) {
                x[idx] += 1.0;
            }
        }
        Ok(x)
    }
}

/// One column per domain input state, holding that feature's weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinaryStateEncoder {
    feature_index: Option<HashMap<String, usize>>,
}

impl BinaryStateEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn calibrated(&self) -> Result<&HashMap<String, usize>> {
        self.feature_index
            .as_ref()
            .ok_or(FeaturizerError::NotPrepared { encoder: self.name() })
    }
}

impl StateEncoder for BinaryStateEncoder {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn prepare(&mut self, domain: &dyn Domain) {
        let index = domain
            .input_states()
            .iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), i))
            .collect();
        self.feature_index = Some(index);
    }

    fn is_prepared(&self) -> bool {
        self.feature_index.is_some()
    }

    fn vocabulary_size(&self) -> Result<usize> {
        Ok(self.calibrated()?.len())
    }

    fn encode(&self, state: Option<&State>) -> Result<Array1<f32>> {
        let index = self.calibrated()?;
        let Some(state) = state else {
            return self.sentinel();
        };

        let mut x = Array1::zeros(index.len());
        for (key, weight) in state.iter() {
            match index.get(key) {
                Some(&i) => x[i] = weight,
                None => debug!("Feature '{}' could not be found in feature map", key),
            }
        }
        Ok(x)
    }
}

/// Any of the built-in encoders, tagged when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SingleStateEncoder {
    Bow(BowStateEncoder),
    Binary(BinaryStateEncoder),
}

impl SingleStateEncoder {
    fn inner(&self) -> &dyn StateEncoder {
        match self {
            Self::Bow(encoder) => encoder,
            Self::Binary(encoder) => encoder,
        }
    }
}

impl StateEncoder for SingleStateEncoder {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn prepare(&mut self, domain: &dyn Domain) {
        match self {
            Self::Bow(encoder) => encoder.prepare(domain),
            Self::Binary(encoder) => encoder.prepare(domain),
        }
    }

    fn is_prepared(&self) -> bool {
        self.inner().is_prepared()
    }

    fn vocabulary_size(&self) -> Result<usize> {
        self.inner().vocabulary_size()
    }

    fn encode(&self, state: Option<&State>) -> Result<Array1<f32>> {
        self.inner().encode(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainSpec, StaticDomain};

    fn domain() -> StaticDomain {
        StaticDomain::new(DomainSpec {
            intents: vec!["greet".into(), "goodbye".into()],
            entities: vec!["name".into()],
            slots: vec![],
            actions: vec!["action_listen".into(), "utter_greet".into()],
        })
    }

    #[test]
    fn test_bow_vocabulary() {
        let mut encoder = BowStateEncoder::new();
        encoder.prepare(&domain());
        // __cls__, action, entity, goodbye, greet, intent, listen, name, prev, utter
        assert_eq!(encoder.vocabulary_size().unwrap(), 10);
        assert_eq!(encoder.vocabulary().unwrap().index_of("__cls__"), Some(0));
    }

    #[test]
    fn test_bow_encode_counts_tokens() {
        let mut encoder = BowStateEncoder::new();
        encoder.prepare(&domain());
        let vocab = encoder.vocabulary().unwrap().clone();

        let state: State = [("intent_greet", 0.3), ("prev_utter_greet", 1.0)]
            .into_iter()
            .collect();
        let x = encoder.encode(Some(&state)).unwrap();

        assert_eq!(x[vocab.index_of("greet").unwrap()], 2.0);
        assert_eq!(x[vocab.index_of("intent").unwrap()], 1.0);
        assert_eq!(x[vocab.index_of("goodbye").unwrap()], 0.0);
    }

    #[test]
    fn test_bow_cls_column_not_counted() {
        let mut encoder = BowStateEncoder::new();
        encoder.prepare(&domain());
        let cls = encoder.vocabulary().unwrap().index_of("__cls__").unwrap();

        let state: State = [("intent_greet", 1.0)].into_iter().collect();
        let x = encoder.encode(Some(&state)).unwrap();
        assert_eq!(x[cls], 0.0);
        assert_eq!(x.sum(), 2.0);

        let empty = encoder.encode(Some(&State::new())).unwrap();
        assert!(empty.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_encode_none_is_sentinel() {
        let mut bow = BowStateEncoder::new();
        bow.prepare(&domain());
        let x = bow.encode(None).unwrap();
        assert_eq!(x.len(), 10);
        assert!(x.iter().all(|&v| v == -1.0));

        let mut binary = BinaryStateEncoder::new();
        binary.prepare(&domain());
        let x = binary.encode(None).unwrap();
        assert_eq!(x.len(), domain().input_states().len());
        assert!(x.iter().all(|&v| v == -1.0));
    }

    #[test]
    fn test_encode_before_prepare_fails() {
        let encoder = BowStateEncoder::new();
        let err = encoder.encode(None).unwrap_err();
        assert!(matches!(err, FeaturizerError::NotPrepared { encoder: "bow" }));

        let encoder = BinaryStateEncoder::new();
        assert!(encoder.encode(Some(&State::new())).is_err());
    }

    #[test]
    fn test_binary_encode_uses_weights() {
        let mut encoder = BinaryStateEncoder::new();
        encoder.prepare(&domain());

        let state: State = [("intent_goodbye", 0.25), ("not_in_domain", 1.0)]
            .into_iter()
            .collect();
        let x = encoder.encode(Some(&state)).unwrap();
        assert_eq!(x.to_vec(), vec![0.0, 0.25, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_prepare_from_states() {
        let mut encoder = BowStateEncoder::new();
        let states: Vec<State> = vec![[("intent_greet", 1.0)].into_iter().collect()];
        encoder.prepare_from_states(&states);
        assert_eq!(encoder.vocabulary_size().unwrap(), 3);
    }

    #[test]
    fn test_action_as_one_hot() {
        let domain = domain();
        let y = action_as_one_hot(Some("utter_greet"), &domain).unwrap();
        assert_eq!(y.to_vec(), vec![0, 1]);

        let y = action_as_one_hot(None, &domain).unwrap();
        assert_eq!(y.to_vec(), vec![-1, -1]);

        let err = action_as_one_hot(Some("utter_bye"), &domain).unwrap_err();
        assert!(matches!(err, FeaturizerError::UnknownAction { .. }));
    }

    #[test]
    fn test_single_state_encoder_delegates() {
        let mut encoder = SingleStateEncoder::Binary(BinaryStateEncoder::new());
        assert!(!encoder.is_prepared());
        encoder.prepare(&domain());
        assert_eq!(encoder.name(), "binary");
        assert_eq!(encoder.vocabulary_size().unwrap(), 5);

        let json = serde_json::to_string(&encoder).unwrap();
        assert!(json.contains(r#""type":"binary""#));
        let back: SingleStateEncoder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, encoder);
    }

    #[test]
    fn test_create_encoded_all_actions() {
        let encoder = BowStateEncoder::new();
        let matrix = encoder.create_encoded_all_actions(&domain()).unwrap();
        assert_eq!(matrix, Array2::<i32>::eye(2));
    }
}
