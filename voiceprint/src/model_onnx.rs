//! [`SpeakerEncoder`] and [`LanguageIdentifier`] backed by ONNX Runtime.

use std::sync::Arc;

use voicematch_onnx::{Session, Tensor};

use crate::error::VoiceprintError;
use crate::fbank::{cmvn, compute_fbank, l2_normalize, FbankConfig};
use crate::language::{argmax, language_code, softmax, Detection, LanguageIdentifier};
use crate::model::SpeakerEncoder;

/// Number of fbank frames per inference segment.
/// 300 frames = 3 seconds at 10ms hop.
const SEG_FRAMES: usize = 300;

/// Hop between segments for averaging.
const HOP_FRAMES: usize = 150;

/// What the exported graph takes as input.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelInput {
    /// Raw mono samples, shape `[1, T]`. The graph computes its own features.
    Waveform,
    /// Log mel filterbank features, shape `[1, T, num_mels]`.
    Fbank(FbankConfig),
}

/// Input/output wiring of an exported model.
#[derive(Debug, Clone)]
pub struct OnnxModelConfig {
    pub input: ModelInput,
    /// Name of the audio/feature input (default: "wavs").
    pub input_name: String,
    /// Optional relative-length input, fed `[1.0]` (SpeechBrain exports
    /// take a `wav_lens` tensor next to the batch).
    pub lengths_name: Option<String>,
    /// Name of the output to read.
    pub output_name: String,
    /// Normalize features to unit variance as well as zero mean.
    pub std_norm: bool,
}

impl OnnxModelConfig {
    /// Wiring of a SpeechBrain ECAPA-TDNN speaker model exported with its
    /// feature front-end.
    pub fn speaker_default() -> Self {
        Self {
            input: ModelInput::Waveform,
            input_name: "wavs".to_string(),
            lengths_name: Some("wav_lens".to_string()),
            output_name: "embeddings".to_string(),
            std_norm: false,
        }
    }

    /// Wiring of the VoxLingua107 classifier exported with its front-end.
    pub fn language_default() -> Self {
        Self {
            output_name: "logits".to_string(),
            ..Self::speaker_default()
        }
    }
}

/// Runs one forward pass over `samples` or a slice of precomputed features.
fn run_model(
    session: &Session,
    cfg: &OnnxModelConfig,
    input: &Tensor,
) -> Result<Vec<f32>, VoiceprintError> {
    let lengths;
    let mut names = vec![cfg.input_name.as_str()];
    let mut inputs = vec![input];
    if let Some(name) = &cfg.lengths_name {
        lengths = Tensor::new(&[1], &[1.0])?;
        names.push(name.as_str());
        inputs.push(&lengths);
    }

    let mut outputs = session.run(&names, &inputs, &[cfg.output_name.as_str()])?;
    let output = outputs
        .pop()
        .ok_or_else(|| VoiceprintError::Model("model produced no output".into()))?;
    Ok(output.into_data())
}

fn waveform_tensor(samples: &[f32]) -> Result<Tensor, VoiceprintError> {
    if samples.is_empty() {
        return Err(VoiceprintError::AudioTooShort {
            min_samples: 1,
            got_samples: 0,
        });
    }
    Ok(Tensor::new(&[1, samples.len() as i64], samples)?)
}

fn feature_tensor(features: &[Vec<f32>]) -> Result<Tensor, VoiceprintError> {
    let num_frames = features.len();
    let num_mels = features.first().map_or(0, Vec::len);
    let flat: Vec<f32> = features.iter().flatten().copied().collect();
    Ok(Tensor::new(&[1, num_frames as i64, num_mels as i64], &flat)?)
}

/// Computes normalized filterbank features or reports the clip as too short.
fn features(
    samples: &[f32],
    fbank: &FbankConfig,
    std_norm: bool,
) -> Result<Vec<Vec<f32>>, VoiceprintError> {
    let too_short = || VoiceprintError::AudioTooShort {
        min_samples: fbank.frame_length,
        got_samples: samples.len(),
    };
    let mut features = compute_fbank(samples, fbank).ok_or_else(too_short)?;
    if features.is_empty() {
        return Err(too_short());
    }
    cmvn(&mut features, std_norm);
    Ok(features)
}

/// [`SpeakerEncoder`] implementation using an ONNX speaker model.
///
/// # Pipeline
///
/// Waveform models get the whole clip in one pass. Filterbank models get
/// [`compute_fbank`] + [`cmvn`] features; clips longer than 3 seconds are
/// split into 300-frame windows with a 150-frame hop, and the L2-normalized
/// window embeddings are averaged. The result is always L2-normalized.
pub struct OnnxSpeakerEncoder {
    session: Arc<Session>,
    cfg: OnnxModelConfig,
    dim: usize,
}

impl OnnxSpeakerEncoder {
    pub fn new(session: Arc<Session>, cfg: OnnxModelConfig, dim: usize) -> Self {
        Self { session, cfg, dim }
    }

    fn embed(&self, input: &Tensor) -> Result<Vec<f32>, VoiceprintError> {
        let mut emb = run_model(&self.session, &self.cfg, input)?;
        if emb.len() != self.dim {
            return Err(VoiceprintError::DimensionMismatch {
                expected: self.dim,
                got: emb.len(),
            });
        }
        l2_normalize(&mut emb);
        Ok(emb)
    }

    fn encode_features(&self, features: &[Vec<f32>]) -> Result<Vec<f32>, VoiceprintError> {
        let num_frames = features.len();
        if num_frames <= SEG_FRAMES {
            return self.embed(&feature_tensor(features)?);
        }

        let mut starts: Vec<usize> = (0..=num_frames - SEG_FRAMES).step_by(HOP_FRAMES).collect();
        // Ensure the last segment covers the end of the audio.
        let tail = num_frames - SEG_FRAMES;
        if starts.last() != Some(&tail) {
            starts.push(tail);
        }

        let mut avg = vec![0.0f32; self.dim];
        let mut count = 0usize;
        for start in starts {
            match self.embed(&feature_tensor(&features[start..start + SEG_FRAMES])?) {
                Ok(emb) => {
                    for (a, v) in avg.iter_mut().zip(&emb) {
                        *a += v;
                    }
                    count += 1;
                }
                Err(e) => tracing::warn!(start, error = %e, "segment embedding failed"),
            }
        }

        if count == 0 {
            return Err(VoiceprintError::Model("all segments failed".into()));
        }
        for v in &mut avg {
            *v /= count as f32;
        }
        l2_normalize(&mut avg);
        Ok(avg)
    }
}

impl SpeakerEncoder for OnnxSpeakerEncoder {
    fn encode(&self, samples: &[f32]) -> Result<Vec<f32>, VoiceprintError> {
        match &self.cfg.input {
            ModelInput::Waveform => self.embed(&waveform_tensor(samples)?),
            ModelInput::Fbank(fbank) => {
                let features = features(samples, fbank, self.cfg.std_norm)?;
                self.encode_features(&features)
            }
        }
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// [`LanguageIdentifier`] implementation using an ONNX classifier.
///
/// The output scores are softmaxed; the arg-max class is mapped through
/// the label list and reduced to its language code.
pub struct OnnxLanguageIdentifier {
    session: Arc<Session>,
    cfg: OnnxModelConfig,
    labels: Vec<String>,
}

impl OnnxLanguageIdentifier {
    pub fn new(
        session: Arc<Session>,
        cfg: OnnxModelConfig,
        labels: Vec<String>,
    ) -> Result<Self, VoiceprintError> {
        if labels.is_empty() {
            return Err(VoiceprintError::Labels("no labels".into()));
        }
        Ok(Self {
            session,
            cfg,
            labels,
        })
    }

    /// Number of languages the classifier distinguishes.
    pub fn num_languages(&self) -> usize {
        self.labels.len()
    }
}

impl LanguageIdentifier for OnnxLanguageIdentifier {
    fn identify(&self, samples: &[f32]) -> Result<Detection, VoiceprintError> {
        let input = match &self.cfg.input {
            ModelInput::Waveform => waveform_tensor(samples)?,
            ModelInput::Fbank(fbank) => feature_tensor(&features(samples, fbank, self.cfg.std_norm)?)?,
        };
        let scores = run_model(&self.session, &self.cfg, &input)?;
        if scores.len() != self.labels.len() {
            return Err(VoiceprintError::DimensionMismatch {
                expected: self.labels.len(),
                got: scores.len(),
            });
        }

        let probs = softmax(&scores);
        let (index, confidence) =
            argmax(&probs).ok_or_else(|| VoiceprintError::Model("empty scores".into()))?;
        Ok(Detection::new(
            language_code(&self.labels[index]),
            confidence.clamp(0.0, 1.0),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_tensor_shape() {
        let features = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let t = feature_tensor(&features).unwrap();
        assert_eq!(t.shape(), &[1, 2, 3]);
        assert_eq!(t.float_data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn waveform_tensor_rejects_empty() {
        assert!(matches!(
            waveform_tensor(&[]),
            Err(VoiceprintError::AudioTooShort { got_samples: 0, .. })
        ));
        assert_eq!(waveform_tensor(&[0.5; 10]).unwrap().shape(), &[1, 10]);
    }

    #[test]
    fn features_too_short() {
        let err = features(&[0.0; 100], &FbankConfig::default(), false).unwrap_err();
        assert!(matches!(
            err,
            VoiceprintError::AudioTooShort {
                min_samples: 400,
                got_samples: 100
            }
        ));
    }

    #[test]
    fn features_are_mean_normalized() {
        let samples: Vec<f32> = (0..8000).map(|i| ((i as f32) * 0.05).sin() * 0.3).collect();
        let feats = features(&samples, &FbankConfig::with_mels(60), false).unwrap();
        assert_eq!(feats[0].len(), 60);
        let mean: f32 = feats.iter().map(|f| f[10]).sum::<f32>() / feats.len() as f32;
        assert!(mean.abs() < 1e-3);
    }

    #[test]
    fn default_wiring() {
        let spk = OnnxModelConfig::speaker_default();
        assert_eq!(spk.input, ModelInput::Waveform);
        assert_eq!(spk.output_name, "embeddings");
        let lang = OnnxModelConfig::language_default();
        assert_eq!(lang.output_name, "logits");
        assert_eq!(lang.input_name, "wavs");
    }
}
