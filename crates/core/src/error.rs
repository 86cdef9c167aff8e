//! Error types for featurization.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for featurizer operations.
pub type Result<T> = std::result::Result<T, FeaturizerError>;

/// Errors that can occur while turning trackers into training arrays.
#[derive(Debug, Error)]
pub enum FeaturizerError {
    /// A story contains more than one unpredictable action.
    #[error(
        "found two unpredictable actions in one story (sender '{sender_id}'), check your story files"
    )]
    UnpredictableActionConflict { sender_id: String },

    /// Action name is not part of the domain.
    #[error("unknown action '{action}' is not part of the domain")]
    UnknownAction { action: String },

    /// The state encoder was used before `prepare` calibrated it.
    #[error("state encoder '{encoder}' is not prepared, call `prepare` with a domain first")]
    NotPrepared { encoder: &'static str },

    /// No trackers were supplied.
    #[error("cannot featurize an empty batch of trackers")]
    EmptyBatch,

    /// A recorded session could not be interpreted.
    #[error("invalid session {path:?}: {message}")]
    InvalidSession { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
