//! ONNX Runtime sessions for the voicematch models.
//!
//! Wraps [`ort`] behind a small, thread-safe surface: a [`Session`] that
//! runs named float32 [`Tensor`] inputs, and a process-wide registry that
//! maps model ids to `.onnx` files.
//!
//! # Usage
//!
//! ```no_run
//! use voicematch_onnx::{load_model, register_model, ModelId, Tensor};
//!
//! register_model(ModelId::SPEAKER_ECAPA_VOXCELEB, "models/spkrec-ecapa-voxceleb.onnx");
//! let session = load_model(ModelId::SPEAKER_ECAPA_VOXCELEB, 1).unwrap();
//!
//! let samples = vec![0.0f32; 16000];
//! let input = Tensor::new(&[1, 16000], &samples).unwrap();
//! let outputs = session.run(&["wavs"], &[&input], &["embeddings"]).unwrap();
//! let embedding = outputs[0].float_data();
//! ```

mod error;
pub mod model;
mod onnx;

pub use error::OnnxError;
pub use model::{list_models, load_model, register_model, ModelId};
pub use onnx::{Session, Tensor};
