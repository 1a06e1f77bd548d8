use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Failures surfaced by the training pipeline.
///
/// Nothing here is retried; the CLI reports the error and exits, leaving
/// artifacts of completed stages on disk.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid training config: {0}")]
    InvalidConfig(String),

    #[error("no interactions to map")]
    EmptyInput,

    #[error("insufficient data: {users} users, {items} items, {examples} examples")]
    InsufficientData {
        users: usize,
        items: usize,
        examples: usize,
    },

    #[error("item index {index} has no entry in the item mapping")]
    MissingMapping { index: usize },

    #[error("item mapping has {mapping} entries but the model was trained on {model} items")]
    ItemCountMismatch { mapping: usize, model: usize },

    #[error("{side} index {index} outside embedding table of {len}")]
    IndexOutOfRange {
        side: &'static str,
        index: u32,
        len: usize,
    },

    #[error("unknown {side} identifier {id}")]
    UnknownIdentifier { side: &'static str, id: String },

    #[error("{operation} failed: {message}")]
    ExternalStore { operation: String, message: String },

    #[error("invalid artifact {}: {reason}", path.display())]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("model error: {0}")]
    Model(#[from] candle_core::Error),
}

impl PipelineError {
    pub fn store(operation: impl Into<String>, message: impl ToString) -> Self {
        PipelineError::ExternalStore {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::InvalidArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
