//! Core featurization logic for dialogue policy training.
//!
//! This crate provides the `TrackerFeaturizer` which turns recorded
//! conversations (trackers of user messages, slot updates and executed
//! actions) into padded numeric arrays for training next-action models.

mod batch;
pub mod config;
mod dedup;
mod domain;
mod encoder;
mod error;
mod featurizer;
mod sequence;
pub mod session;
mod state;
mod tracker;
mod windowing;

pub use batch::{encode_labels, encode_windows, true_length, Labels, TrainingData};
pub use config::{EncoderKind, FeaturizerConfig, StrategyKind};
pub use dedup::{hash_example, ExampleDeduplicator};
pub use domain::{Domain, DomainSpec, StaticDomain};
pub use encoder::{
    action_as_one_hot, BinaryStateEncoder, BowStateEncoder, SingleStateEncoder, StateEncoder,
    Vocabulary,
};
pub use error::{FeaturizerError, Result};
pub use featurizer::{TrackerFeaturizer, FEATURIZER_FILE};
pub use sequence::{binarize_intents, compress_repeated_intents, create_states};
pub use session::{discover_session_files, load_all_sessions, load_session};
pub use state::{FrozenState, State};
pub use tracker::{DialogueTracker, Event, Tracker};
pub use windowing::{slice_state_history, TrainingExamples, WindowingStrategy};

/// Key prefix of user intent features.
pub const INTENT_PREFIX: &str = "intent_";

/// Key prefix of entity features.
pub const ENTITY_PREFIX: &str = "entity_";

/// Key prefix of slot features.
pub const SLOT_PREFIX: &str = "slot_";

/// Key prefix of the previous action feature.
pub const PREV_PREFIX: &str = "prev_";

/// Extra bag-of-words token present in every encoded turn.
pub const CLS_TOKEN: &str = "__cls__";

/// Fill value of padded turns and labels.
pub const SENTINEL: i32 = -1;

/// Default window length of the max-history strategy.
pub const MAX_HISTORY_DEFAULT: usize = 5;
