use crate::error::VoiceprintError;

/// Extracts speaker embedding vectors from audio.
///
/// The input is mono `f32` audio in `[-1, 1]` at the sample rate the model
/// was trained on (16kHz for the ECAPA-TDNN models). The output is a dense
/// vector of [`SpeakerEncoder::dimension`] values, L2-normalized.
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use.
pub trait SpeakerEncoder: Send + Sync {
    /// Computes a unit-length speaker embedding.
    fn encode(&self, samples: &[f32]) -> Result<Vec<f32>, VoiceprintError>;

    /// Returns the dimensionality of the embedding vectors (e.g., 192).
    fn dimension(&self) -> usize;
}
