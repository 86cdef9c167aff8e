//! Featurizer configuration.

use serde::{Deserialize, Serialize};

use crate::encoder::{BinaryStateEncoder, BowStateEncoder, SingleStateEncoder};
use crate::featurizer::TrackerFeaturizer;
use crate::windowing::WindowingStrategy;
use crate::MAX_HISTORY_DEFAULT;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Full,
    #[default]
    MaxHistory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    #[default]
    Bow,
    Binary,
}

/// Configuration for building a [`TrackerFeaturizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturizerConfig {
    pub strategy: StrategyKind,
    /// Window length for the max-history strategy.
    pub max_history: usize,
    pub remove_duplicates: bool,
    /// Compare examples exactly when their hashes match.
    pub verify_collisions: bool,
    /// Keep raw intent confidences instead of the single best intent.
    pub use_intent_probabilities: bool,
    pub encoder: EncoderKind,
}

impl Default for FeaturizerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            max_history: MAX_HISTORY_DEFAULT,
            remove_duplicates: true,
            verify_collisions: false,
            use_intent_probabilities: false,
            encoder: EncoderKind::default(),
        }
    }
}

impl FeaturizerConfig {
    pub fn windowing_strategy(&self) -> WindowingStrategy {
        match self.strategy {
            StrategyKind::Full => WindowingStrategy::full_dialogue(),
            StrategyKind::MaxHistory => {
                let strategy =
                    WindowingStrategy::max_history(Some(self.max_history), self.remove_duplicates);
                if self.verify_collisions {
                    strategy.with_verified_collisions()
                } else {
                    strategy
                }
            }
        }
    }

    pub fn state_encoder(&self) -> SingleStateEncoder {
        match self.encoder {
            EncoderKind::Bow => SingleStateEncoder::Bow(BowStateEncoder::new()),
            EncoderKind::Binary => SingleStateEncoder::Binary(BinaryStateEncoder::new()),
        }
    }

    /// Build an uncalibrated featurizer.
    pub fn build(&self) -> TrackerFeaturizer<SingleStateEncoder> {
        TrackerFeaturizer::new(
            self.state_encoder(),
            self.windowing_strategy(),
            self.use_intent_probabilities,
        )
    }
}
