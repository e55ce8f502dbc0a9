//! Service configuration.
//!
//! Loaded from a YAML file; every field has a default, so the service
//! also runs without one. Model paths are resolved against `models.dir`.
//!
//! ```yaml
//! server:
//!   addr: 0.0.0.0:5001
//! models:
//!   dir: pretrained_models
//!   language:
//!     features: fbank
//!     num_mels: 60
//! routing:
//!   asian_languages: [zh, ja, ko, th, vi, yue, cmn]
//! matching:
//!   threshold: 0.7
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use voicematch_onnx::ModelId;
use voicematch_voiceprint::{
    FbankConfig, ModelInput, OnnxModelConfig, DEFAULT_ASIAN_LANGUAGES, DEFAULT_MATCH_THRESHOLD,
};

/// Default listen address.
pub const DEFAULT_ADDR: &str = "0.0.0.0:5001";
/// Default upload limit (32 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 32 * 1024 * 1024;
/// Default number of ranked matches returned by `/find-match`.
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub routing: RoutingConfig,
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address; `:5001` binds all interfaces.
    pub addr: String,
    /// Maximum request body size in bytes.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory holding the exported models.
    pub dir: PathBuf,
    /// Sample rate the models were trained on.
    pub sample_rate: u32,
    /// Intra-op threads per session; 0 keeps the runtime default.
    pub threads: usize,
    pub cnceleb: ModelConfig,
    pub voxceleb: ModelConfig,
    pub language: ModelConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("pretrained_models"),
            sample_rate: 16000,
            threads: 0,
            cnceleb: ModelConfig::default(),
            voxceleb: ModelConfig::default(),
            language: ModelConfig::default(),
        }
    }
}

/// Input features an exported model expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Raw samples; the graph includes its own front-end.
    #[default]
    Waveform,
    /// Log mel filterbank frames computed by the service.
    Fbank,
}

/// Location and wiring of one exported model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model file; defaults to `<dir>/<model-id>.onnx`.
    pub path: Option<PathBuf>,
    pub features: FeatureKind,
    /// Mel bins for `fbank` features; 80 for speaker models, 60 for the
    /// language model when unset.
    pub num_mels: Option<usize>,
    /// Normalize fbank features to unit variance.
    pub std_norm: bool,
    pub input: String,
    /// Relative-length input; `null` for graphs without one.
    pub lengths: Option<String>,
    /// Output name; `embeddings` for speaker models, `logits` for the
    /// language model when unset.
    pub output: Option<String>,
    /// Embedding dimension (speaker models only).
    pub dim: usize,
    /// Label list (language model only); defaults to
    /// `<dir>/<model-id>.labels.txt`.
    pub labels: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            features: FeatureKind::Waveform,
            num_mels: None,
            std_norm: false,
            input: "wavs".to_string(),
            lengths: Some("wav_lens".to_string()),
            output: None,
            dim: 192,
            labels: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Language codes routed to the CN-Celeb model.
    pub asian_languages: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            asian_languages: DEFAULT_ASIAN_LANGUAGES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Similarity above which two voices are the same speaker.
    pub threshold: f32,
    /// Ranked matches returned when a request omits `top_n`.
    pub default_top_n: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            default_top_n: DEFAULT_TOP_N,
        }
    }
}

/// The three models the service loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    CnCeleb,
    VoxCeleb,
    Language,
}

impl ModelRole {
    pub const ALL: [ModelRole; 3] = [ModelRole::CnCeleb, ModelRole::VoxCeleb, ModelRole::Language];

    /// Registry id of the model.
    pub fn id(&self) -> &'static str {
        match self {
            ModelRole::CnCeleb => ModelId::SPEAKER_ECAPA_CNCELEB,
            ModelRole::VoxCeleb => ModelId::SPEAKER_ECAPA_VOXCELEB,
            ModelRole::Language => ModelId::LANG_ID_VOXLINGUA107,
        }
    }

    /// Key of the role's section under `models`.
    pub fn key(&self) -> &'static str {
        match self {
            ModelRole::CnCeleb => "cnceleb",
            ModelRole::VoxCeleb => "voxceleb",
            ModelRole::Language => "language",
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file, or defaults when `path` is None.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .map_err(|e| anyhow::anyhow!("read config {}: {e}", p.display()))?;
                Self::from_yaml(&content)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(-1.0..=1.0).contains(&self.matching.threshold) {
            anyhow::bail!(
                "matching.threshold must be within [-1, 1], got {}",
                self.matching.threshold
            );
        }
        if self.models.sample_rate == 0 {
            anyhow::bail!("models.sample_rate must be positive");
        }
        for role in [ModelRole::CnCeleb, ModelRole::VoxCeleb] {
            if self.model(role).dim == 0 {
                anyhow::bail!("models.{}.dim must be positive", role.key());
            }
        }
        Ok(())
    }

    /// Replaces the port of the listen address, as the `PORT` variable does.
    pub fn set_port(&mut self, port: u16) {
        let host = match self.server.addr.rsplit_once(':') {
            Some((host, _)) if !host.is_empty() => host.to_string(),
            _ => "0.0.0.0".to_string(),
        };
        self.server.addr = format!("{host}:{port}");
    }

    /// Parses the listen address; a leading `:` means all interfaces.
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        parse_addr(&self.server.addr)
    }

    pub fn model(&self, role: ModelRole) -> &ModelConfig {
        match role {
            ModelRole::CnCeleb => &self.models.cnceleb,
            ModelRole::VoxCeleb => &self.models.voxceleb,
            ModelRole::Language => &self.models.language,
        }
    }

    /// Resolved model file for `role`.
    pub fn model_path(&self, role: ModelRole) -> PathBuf {
        match &self.model(role).path {
            Some(p) => self.resolve(p),
            None => self.models.dir.join(format!("{}.onnx", role.id())),
        }
    }

    /// Resolved label list of the language model.
    pub fn labels_path(&self) -> PathBuf {
        match &self.models.language.labels {
            Some(p) => self.resolve(p),
            None => self
                .models
                .dir
                .join(format!("{}.labels.txt", ModelRole::Language.id())),
        }
    }

    /// Input/output wiring for `role`, with per-role defaults filled in.
    pub fn onnx_config(&self, role: ModelRole) -> OnnxModelConfig {
        let m = self.model(role);
        let (default_mels, default_output) = match role {
            ModelRole::Language => (60, "logits"),
            _ => (80, "embeddings"),
        };
        let input = match m.features {
            FeatureKind::Waveform => ModelInput::Waveform,
            FeatureKind::Fbank => ModelInput::Fbank(FbankConfig {
                sample_rate: self.models.sample_rate as usize,
                frame_length: self.models.sample_rate as usize / 40, // 25ms
                frame_shift: self.models.sample_rate as usize / 100, // 10ms
                ..FbankConfig::with_mels(m.num_mels.unwrap_or(default_mels))
            }),
        };
        OnnxModelConfig {
            input,
            input_name: m.input.clone(),
            lengths_name: m.lengths.clone(),
            output_name: m.output.clone().unwrap_or_else(|| default_output.to_string()),
            std_norm: m.std_norm,
        }
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.models.dir.join(p)
        }
    }
}

/// Parse address string to SocketAddr.
pub fn parse_addr(addr: &str) -> anyhow::Result<SocketAddr> {
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    addr.parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address {addr:?}: {e}"))
}
