use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by ONNX Runtime operations.
#[derive(Debug, Error)]
pub enum OnnxError {
    #[error("onnx: {0}")]
    Runtime(String),

    #[error("onnx: model {0:?} not registered")]
    ModelNotRegistered(String),

    #[error("onnx: model file not found: {}", .0.display())]
    ModelFileNotFound(PathBuf),

    #[error("onnx: empty data")]
    EmptyData,

    #[error("onnx: output {0:?} missing from session results")]
    MissingOutput(String),
}
