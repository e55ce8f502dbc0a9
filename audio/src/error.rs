use thiserror::Error;

/// Errors returned while decoding or converting audio.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio: invalid wav: {0}")]
    Wav(#[from] hound::Error),

    #[error("audio: unsupported sample format: {0}")]
    Unsupported(String),

    #[error("audio: clip contains no samples")]
    Empty,

    #[error("audio: invalid sample rate {0}")]
    InvalidRate(u32),

    #[error("audio: resampler: {0}")]
    Resampler(String),
}

impl From<rubato::ResamplerConstructionError> for AudioError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        AudioError::Resampler(e.to_string())
    }
}

impl From<rubato::ResampleError> for AudioError {
    fn from(e: rubato::ResampleError) -> Self {
        AudioError::Resampler(e.to_string())
    }
}
