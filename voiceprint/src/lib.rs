//! Speaker embeddings with language-based model routing.
//!
//! # Architecture
//!
//! A clip goes through three stages:
//!
//! 1. [`LanguageIdentifier::identify`]: mono 16kHz samples -> [`Detection`]
//! 2. [`VoiceMatcher::select_model`]: language code -> CN-Celeb or VoxCeleb
//!    [`SpeakerEncoder`]
//! 3. [`SpeakerEncoder::encode`]: samples -> unit-length embedding
//!
//! Embeddings are compared with [`cosine_similarity`]; a pair is the same
//! speaker when the similarity exceeds [`DEFAULT_MATCH_THRESHOLD`].
//! [`find_closest_match`] ranks a caller-supplied collection by linear scan.
//!
//! # Feature Extraction
//!
//! Models exported without their front-end take features from the
//! [`fbank`] module:
//! - Hamming or Povey window, optional pre-emphasis
//! - Radix-2 FFT
//! - Mel triangular filterbank, dB or natural log
//! - Sentence-level mean (and variance) normalization

mod error;
pub mod fbank;
mod language;
mod matcher;
mod model;
mod model_onnx;
mod similarity;

pub use error::VoiceprintError;
pub use fbank::{cmvn, compute_fbank, l2_normalize, FbankConfig};
pub use language::{
    argmax, language_code, parse_labels, softmax, Detection, LanguageIdentifier,
    DEFAULT_ASIAN_LANGUAGES, UNKNOWN_LANGUAGE,
};
pub use matcher::{Extraction, ModelFamily, VoiceMatcher};
pub use model::SpeakerEncoder;
pub use model_onnx::{ModelInput, OnnxLanguageIdentifier, OnnxModelConfig, OnnxSpeakerEncoder};
pub use similarity::{
    cosine_similarity, find_closest_match, Candidate, MatchOutcome, RankedMatch,
    DEFAULT_MATCH_THRESHOLD,
};
