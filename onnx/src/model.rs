//! Model registry: register and load ONNX models by ID.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::error::OnnxError;
use crate::onnx::Session;

/// Identifies a known ONNX model.
pub struct ModelId;

impl ModelId {
    /// ECAPA-TDNN speaker embedding trained on CN-Celeb.
    /// Used for Chinese, Japanese, Korean, Thai and Vietnamese speech.
    pub const SPEAKER_ECAPA_CNCELEB: &str = "spkrec-ecapa-cnceleb";

    /// ECAPA-TDNN speaker embedding trained on VoxCeleb.
    /// Used for every other language.
    pub const SPEAKER_ECAPA_VOXCELEB: &str = "spkrec-ecapa-voxceleb";

    /// ECAPA-TDNN spoken language classifier over the 107 VoxLingua107 languages.
    pub const LANG_ID_VOXLINGUA107: &str = "lang-id-voxlingua107-ecapa";
}

/// Describes a registered model.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub path: PathBuf,
}

pub(crate) static REGISTRY: Lazy<Mutex<HashMap<String, ModelInfo>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Registers a model file under the given ID, replacing any previous entry.
pub fn register_model(id: &str, path: impl AsRef<Path>) {
    let mut reg = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    reg.insert(
        id.to_string(),
        ModelInfo {
            path: path.as_ref().to_path_buf(),
        },
    );
}

/// Returns the registration for `id`, if any.
pub fn model_info(id: &str) -> Option<ModelInfo> {
    let reg = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    reg.get(id).cloned()
}

/// Loads a registered model by ID, returning a ready-to-use Session.
pub fn load_model(id: &str, threads: usize) -> Result<Session, OnnxError> {
    let info = model_info(id).ok_or_else(|| OnnxError::ModelNotRegistered(id.to_string()))?;
    tracing::info!(model = id, path = %info.path.display(), "loading onnx model");
    Session::from_file(&info.path, threads)
}

/// Returns the IDs of all registered models, sorted.
pub fn list_models() -> Vec<String> {
    let reg = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    let mut ids: Vec<String> = reg.keys().cloned().collect();
    ids.sort();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_model() {
        let err = load_model("no-such-model", 1).err().unwrap();
        assert!(matches!(err, OnnxError::ModelNotRegistered(id) if id == "no-such-model"));
    }

    #[test]
    fn register_and_list() {
        register_model("test-register-a", "/models/a.onnx");
        register_model("test-register-b", "/models/b.onnx");
        let ids = list_models();
        assert!(ids.contains(&"test-register-a".to_string()));
        assert!(ids.contains(&"test-register-b".to_string()));

        let info = model_info("test-register-a").unwrap();
        assert_eq!(info.path, PathBuf::from("/models/a.onnx"));
    }

    #[test]
    fn register_replaces_path() {
        register_model("test-replace", "/models/old.onnx");
        register_model("test-replace", "/models/new.onnx");
        assert_eq!(
            model_info("test-replace").unwrap().path,
            PathBuf::from("/models/new.onnx")
        );
    }

    #[test]
    fn registered_but_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.onnx");
        register_model("test-missing-file", &path);
        let err = load_model("test-missing-file", 1).err().unwrap();
        assert!(matches!(err, OnnxError::ModelFileNotFound(p) if p == path));
    }
}
