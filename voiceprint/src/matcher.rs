//! Language-routed speaker embedding and matching.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::VoiceprintError;
use crate::fbank::l2_normalize;
use crate::language::{Detection, LanguageIdentifier, DEFAULT_ASIAN_LANGUAGES};
use crate::model::SpeakerEncoder;
use crate::similarity::{
    cosine_similarity, find_closest_match, Candidate, MatchOutcome, DEFAULT_MATCH_THRESHOLD,
};

/// Which speaker model produced an embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// ECAPA-TDNN trained on CN-Celeb, used for Asian languages.
    CnCeleb,
    /// ECAPA-TDNN trained on VoxCeleb, used for everything else.
    VoxCeleb,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::CnCeleb => "cnceleb",
            ModelFamily::VoxCeleb => "voxceleb",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A speaker embedding together with the routing decision behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Unit-length speaker embedding.
    pub embedding: Vec<f32>,
    pub language: String,
    pub confidence: f32,
    pub model: ModelFamily,
}

/// Holds the three models and routes each clip to a speaker model by its
/// detected language.
///
/// Clips detected as one of the Asian languages are embedded with the
/// CN-Celeb model; all others, including undetectable ones, with the
/// VoxCeleb model.
pub struct VoiceMatcher {
    cnceleb: Arc<dyn SpeakerEncoder>,
    voxceleb: Arc<dyn SpeakerEncoder>,
    detector: Arc<dyn LanguageIdentifier>,
    asian_languages: HashSet<String>,
    threshold: f32,
}

impl VoiceMatcher {
    pub fn new(
        cnceleb: Arc<dyn SpeakerEncoder>,
        voxceleb: Arc<dyn SpeakerEncoder>,
        detector: Arc<dyn LanguageIdentifier>,
    ) -> Self {
        Self {
            cnceleb,
            voxceleb,
            detector,
            asian_languages: DEFAULT_ASIAN_LANGUAGES.iter().map(|s| s.to_string()).collect(),
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    /// Replaces the set of language codes routed to the CN-Celeb model.
    pub fn with_asian_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.asian_languages = languages.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the similarity above which two voices count as a match.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Reports whether a similarity score counts as the same speaker.
    pub fn is_match(&self, similarity: f32) -> bool {
        similarity > self.threshold
    }

    /// Detects the spoken language. Never fails: classifier errors are
    /// logged and reported as [`Detection::unknown`].
    pub fn detect_language(&self, samples: &[f32]) -> Detection {
        match self.detector.identify(samples) {
            Ok(d) => {
                info!(language = %d.language, confidence = d.confidence, "detected language");
                d
            }
            Err(e) => {
                warn!(error = %e, "language detection failed");
                Detection::unknown()
            }
        }
    }

    /// Picks the speaker model for a language code.
    pub fn select_model(&self, language: &str) -> (ModelFamily, &dyn SpeakerEncoder) {
        let family = if self.asian_languages.contains(language) {
            ModelFamily::CnCeleb
        } else {
            ModelFamily::VoxCeleb
        };
        info!(language, model = %family, "selected speaker model");
        match family {
            ModelFamily::CnCeleb => (family, self.cnceleb.as_ref()),
            ModelFamily::VoxCeleb => (family, self.voxceleb.as_ref()),
        }
    }

    /// Detects the language, routes to a speaker model and returns a
    /// unit-length embedding.
    pub fn extract_embedding(&self, samples: &[f32]) -> Result<Extraction, VoiceprintError> {
        let detection = self.detect_language(samples);
        let (model, encoder) = self.select_model(&detection.language);

        let mut embedding = encoder.encode(samples)?;
        if embedding.is_empty() {
            return Err(VoiceprintError::EmptyEmbedding);
        }
        l2_normalize(&mut embedding);
        info!(dim = embedding.len(), model = %model, "extracted embedding");

        Ok(Extraction {
            embedding,
            language: detection.language,
            confidence: detection.confidence,
            model,
        })
    }

    /// Cosine similarity of two embeddings.
    pub fn compare_embeddings(&self, a: &[f32], b: &[f32]) -> Result<f32, VoiceprintError> {
        cosine_similarity(a, b)
    }

    /// Ranks stored voices against `query`; see [`find_closest_match`].
    pub fn find_closest_match(
        &self,
        query: &[f32],
        candidates: &[Candidate],
    ) -> Result<MatchOutcome, VoiceprintError> {
        find_closest_match(query, candidates)
    }
}
