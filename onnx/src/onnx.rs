//! Safe wrappers around an ONNX Runtime session and float32 tensors.

use std::fmt::Display;
use std::path::Path;
use std::sync::Mutex;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session as OrtSession, SessionInputValue};
use ort::value::Tensor as OrtTensor;

use crate::error::OnnxError;

fn runtime(e: impl Display) -> OnnxError {
    OnnxError::Runtime(e.to_string())
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Holds a loaded ONNX model.
///
/// ONNX Runtime needs exclusive access to run a session, so calls to
/// [`Session::run`] are serialized. Share the session behind an `Arc`.
pub struct Session {
    inner: Mutex<OrtSession>,
}

impl Session {
    /// Loads a model from an `.onnx` file.
    ///
    /// `threads` sets the intra-op thread count; 0 keeps the runtime default.
    pub fn from_file(path: &Path, threads: usize) -> Result<Self, OnnxError> {
        if !path.is_file() {
            return Err(OnnxError::ModelFileNotFound(path.to_path_buf()));
        }

        let mut builder = OrtSession::builder()
            .map_err(runtime)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(runtime)?;
        if threads > 0 {
            builder = builder.with_intra_threads(threads).map_err(runtime)?;
        }
        let session = builder.commit_from_file(path).map_err(runtime)?;

        Ok(Self {
            inner: Mutex::new(session),
        })
    }

    /// Runs inference with the given inputs and output names.
    ///
    /// Outputs are returned in the order of `output_names`.
    pub fn run(
        &self,
        input_names: &[&str],
        inputs: &[&Tensor],
        output_names: &[&str],
    ) -> Result<Vec<Tensor>, OnnxError> {
        if input_names.len() != inputs.len() {
            return Err(OnnxError::Runtime(format!(
                "input names/tensors length mismatch: {} vs {}",
                input_names.len(),
                inputs.len()
            )));
        }

        let mut values: Vec<(String, SessionInputValue<'static>)> = Vec::with_capacity(inputs.len());
        for (name, tensor) in input_names.iter().zip(inputs) {
            let value = OrtTensor::from_array((tensor.shape.clone(), tensor.data.clone()))
                .map_err(runtime)?;
            values.push((name.to_string(), value.into()));
        }

        let mut session = self
            .inner
            .lock()
            .map_err(|_| OnnxError::Runtime("session lock poisoned".into()))?;
        let outputs = session.run(values).map_err(runtime)?;

        let mut result = Vec::with_capacity(output_names.len());
        for name in output_names {
            let value = outputs
                .get(*name)
                .ok_or_else(|| OnnxError::MissingOutput(name.to_string()))?;
            let (shape, data) = value.try_extract_tensor::<f32>().map_err(runtime)?;
            result.push(Tensor {
                shape: shape.to_vec(),
                data: data.to_vec(),
            });
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tensor
// ---------------------------------------------------------------------------

/// N-dimensional float32 tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<i64>,
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a float32 tensor with the given shape and data.
    ///
    /// Data beyond the product of the shape is dropped.
    pub fn new(shape: &[i64], data: &[f32]) -> Result<Self, OnnxError> {
        if data.is_empty() {
            return Err(OnnxError::EmptyData);
        }
        if let Some(d) = shape.iter().find(|&&d| d < 0) {
            return Err(OnnxError::Runtime(format!("negative tensor dimension {d}")));
        }

        let total: i64 = shape.iter().product();
        if (data.len() as i64) < total {
            return Err(OnnxError::Runtime(format!(
                "tensor data too short: got {}, need {total}",
                data.len()
            )));
        }

        Ok(Self {
            shape: shape.to_vec(),
            data: data[..total as usize].to_vec(),
        })
    }

    /// Returns the tensor data in row-major order.
    pub fn float_data(&self) -> &[f32] {
        &self.data
    }

    /// Consumes the tensor, returning its data.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Returns the tensor dimensions.
    pub fn shape(&self) -> &[i64] {
        &self.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_create_and_read() {
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let tensor = Tensor::new(&[3, 4], &data).unwrap();
        assert_eq!(tensor.shape(), &[3, 4]);
        assert_eq!(tensor.float_data(), data.as_slice());
    }

    #[test]
    fn tensor_drops_extra_data() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        let tensor = Tensor::new(&[1, 4], &data).unwrap();
        assert_eq!(tensor.into_data(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn tensor_empty_error() {
        assert!(matches!(Tensor::new(&[1], &[]), Err(OnnxError::EmptyData)));
    }

    #[test]
    fn tensor_short_data_error() {
        assert!(Tensor::new(&[2, 3], &[0.0; 5]).is_err());
    }

    #[test]
    fn tensor_negative_dim_error() {
        assert!(Tensor::new(&[-1, 3], &[0.0; 3]).is_err());
    }

    #[test]
    fn session_missing_file() {
        let err = Session::from_file(Path::new("/nonexistent/model.onnx"), 0)
            .err()
            .unwrap();
        assert!(matches!(err, OnnxError::ModelFileNotFound(_)));
    }
}
