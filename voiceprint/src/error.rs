use thiserror::Error;

use voicematch_onnx::OnnxError;

/// Errors returned by voiceprint operations.
#[derive(Debug, Error)]
pub enum VoiceprintError {
    #[error("audio too short: need at least {min_samples} samples, got {got_samples}")]
    AudioTooShort {
        min_samples: usize,
        got_samples: usize,
    },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding is empty")]
    EmptyEmbedding,

    #[error("embedding component {index} is not a finite number")]
    NonFinite { index: usize },

    #[error("model error: {0}")]
    Model(String),

    #[error("invalid label list: {0}")]
    Labels(String),

    #[error(transparent)]
    Onnx(#[from] OnnxError),
}
