//! Shared server state and lazy model loading.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::OnceCell;
use tracing::{error, info};
use voicematch_onnx::{load_model, register_model};
use voicematch_voiceprint::{
    parse_labels, OnnxLanguageIdentifier, OnnxSpeakerEncoder, SpeakerEncoder, VoiceMatcher,
};

use crate::config::{Config, ModelRole};
use crate::error::ApiError;

/// Builds the matcher. Runs on a blocking thread.
pub type Loader = Arc<dyn Fn() -> anyhow::Result<VoiceMatcher> + Send + Sync>;

/// State shared by all handlers.
///
/// The matcher is built on first use. Concurrent first requests wait on a
/// single load; a failed load leaves the state empty so the next request
/// tries again.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    matcher: OnceCell<Arc<VoiceMatcher>>,
    loader: Loader,
}

impl AppState {
    /// State that loads the ONNX models described by `config`.
    pub fn from_config(config: Config) -> Self {
        let cfg = config.clone();
        Self::with_loader(config, Arc::new(move || load_matcher(&cfg)))
    }

    /// State that builds its matcher with `loader`.
    pub fn with_loader(config: Config, loader: Loader) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                matcher: OnceCell::new(),
                loader,
            }),
        }
    }

    /// State around an already built matcher.
    pub fn with_matcher(config: Config, matcher: VoiceMatcher) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                matcher: OnceCell::new_with(Some(Arc::new(matcher))),
                loader: Arc::new(|| -> anyhow::Result<VoiceMatcher> {
                    anyhow::bail!("matcher already provided")
                }),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Reports whether the models are loaded, without loading them.
    pub fn is_loaded(&self) -> bool {
        self.inner.matcher.initialized()
    }

    /// Returns the matcher, loading the models on first call.
    pub async fn matcher(&self) -> Result<Arc<VoiceMatcher>, ApiError> {
        let matcher = self
            .inner
            .matcher
            .get_or_try_init(|| async {
                let loader = self.inner.loader.clone();
                let matcher = tokio::task::spawn_blocking(move || loader()).await??;
                info!("voice matching models loaded");
                Ok::<_, ApiError>(Arc::new(matcher))
            })
            .await
            .inspect_err(|e| error!(error = %e, "failed to initialize voice matcher"))?;
        Ok(matcher.clone())
    }
}

/// Registers and loads the three models named by `cfg`.
pub fn load_matcher(cfg: &Config) -> anyhow::Result<VoiceMatcher> {
    for role in ModelRole::ALL {
        register_model(role.id(), cfg.model_path(role));
    }

    let cnceleb = load_speaker(cfg, ModelRole::CnCeleb)?;
    let voxceleb = load_speaker(cfg, ModelRole::VoxCeleb)?;

    let role = ModelRole::Language;
    let session = load_model(role.id(), cfg.models.threads)
        .with_context(|| format!("load {} model", role.key()))?;
    let labels_path = cfg.labels_path();
    let text = std::fs::read_to_string(&labels_path)
        .with_context(|| format!("read language labels {}", labels_path.display()))?;
    let labels = parse_labels(&text)?;
    let detector = OnnxLanguageIdentifier::new(Arc::new(session), cfg.onnx_config(role), labels)?;
    info!(languages = detector.num_languages(), "language identifier ready");

    Ok(VoiceMatcher::new(cnceleb, voxceleb, Arc::new(detector))
        .with_asian_languages(cfg.routing.asian_languages.iter().cloned())
        .with_threshold(cfg.matching.threshold))
}

fn load_speaker(cfg: &Config, role: ModelRole) -> anyhow::Result<Arc<dyn SpeakerEncoder>> {
    let session = load_model(role.id(), cfg.models.threads)
        .with_context(|| format!("load {} model", role.key()))?;
    let dim = cfg.model(role).dim;
    info!(model = role.key(), dim, "speaker model ready");
    Ok(Arc::new(OnnxSpeakerEncoder::new(
        Arc::new(session),
        cfg.onnx_config(role),
        dim,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use voicematch_voiceprint::{Detection, LanguageIdentifier, VoiceprintError};

    struct Constant;

    impl SpeakerEncoder for Constant {
        fn encode(&self, _samples: &[f32]) -> Result<Vec<f32>, VoiceprintError> {
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    impl LanguageIdentifier for Constant {
        fn identify(&self, _samples: &[f32]) -> Result<Detection, VoiceprintError> {
            Ok(Detection::new("en", 1.0))
        }
    }

    fn fake_matcher() -> VoiceMatcher {
        VoiceMatcher::new(Arc::new(Constant), Arc::new(Constant), Arc::new(Constant))
    }

    #[tokio::test]
    async fn failed_load_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let state = AppState::with_loader(
            Config::default(),
            Arc::new(move || {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("disk on fire");
                }
                Ok(fake_matcher())
            }),
        );

        let err = state.matcher().await.err().unwrap();
        assert!(err.to_string().contains("disk on fire"));
        assert!(!state.is_loaded());

        state.matcher().await.unwrap();
        assert!(state.is_loaded());
        state.matcher().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_first_requests_load_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let state = AppState::with_loader(
            Config::default(),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                Ok(fake_matcher())
            }),
        );

        let (a, b) = tokio::join!(state.matcher(), state.matcher());
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn provided_matcher_is_loaded() {
        let state = AppState::with_matcher(Config::default(), fake_matcher());
        assert!(state.is_loaded());
        assert!(state.matcher().await.is_ok());
    }

    #[test]
    fn missing_models_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.models.dir = dir.path().to_path_buf();
        let err = load_matcher(&cfg).err().unwrap();
        assert!(format!("{err:#}").contains("cnceleb"));
    }
}
