//! voicematch HTTP service.
//!
//! Routes each uploaded clip through a spoken-language classifier to one of
//! two ECAPA-TDNN speaker models (CN-Celeb for Asian languages, VoxCeleb
//! otherwise), returns unit-length speaker embeddings and compares them by
//! cosine similarity.
//!
//! The binary in `main.rs` wires [`config::Config`] into [`server::run`];
//! tests build an [`AppState`] around fake models and call
//! [`server::serve`] directly.

pub mod config;
pub mod error;
pub mod server;
pub mod state;

pub use config::Config;
pub use error::ApiError;
pub use state::AppState;
