//! HTTP API.
//!
//! API endpoints:
//! - GET  /health            - {status, models_loaded}
//! - POST /extract-embedding - multipart `audio` -> embedding, language, model
//! - POST /compare-voices    - {embedding1, embedding2} -> similarity
//! - POST /find-match        - {user_embedding, stored_embeddings, top_n} -> ranking
//! - POST /detect-language   - multipart `audio` -> language, confidence

use anyhow::Result;
use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use voicematch_voiceprint::{Candidate, Detection, ModelFamily, RankedMatch};

use crate::config::Config;
use crate::error::ApiError;
use crate::state::AppState;

const NO_AUDIO: &str = "No audio file provided";
const NEED_EMBEDDINGS: &str = "Both embedding1 and embedding2 required";
const NEED_MATCH_INPUT: &str = "user_embedding and stored_embeddings required";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub models_loaded: bool,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    pub embedding: Vec<f32>,
    pub language: String,
    pub confidence: f32,
    pub embedding_size: usize,
    pub model: ModelFamily,
}

/// Request fields distinguish a missing key (`None`) from an explicit
/// `null` (`Some(None)`): only a missing key is a bad request.
#[derive(Debug, Default, Deserialize)]
pub struct CompareRequest {
    #[serde(default, deserialize_with = "present")]
    pub embedding1: Option<Option<Vec<f32>>>,
    #[serde(default, deserialize_with = "present")]
    pub embedding2: Option<Option<Vec<f32>>>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub success: bool,
    pub similarity: f32,
    pub is_match: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct FindMatchRequest {
    #[serde(default, deserialize_with = "present")]
    pub user_embedding: Option<Option<Vec<f32>>>,
    /// `null` is an empty collection.
    #[serde(default, deserialize_with = "present")]
    pub stored_embeddings: Option<Option<Vec<Candidate>>>,
    /// Missing uses the configured default; `null` returns every match.
    #[serde(default, deserialize_with = "present")]
    pub top_n: Option<Option<usize>>,
}

/// Marks a key as present, keeping an explicit `null` as `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct BestMatch {
    /// `null` when the collection is empty.
    pub id: Option<Value>,
    pub similarity: f32,
    pub is_match: bool,
}

#[derive(Debug, Serialize)]
pub struct FindMatchResponse {
    pub success: bool,
    pub best_match: BestMatch,
    pub top_matches: Vec<RankedMatch>,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub success: bool,
    pub language: String,
    pub confidence: f32,
}

/// Builds the router with CORS, request tracing and the upload limit.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config().server.body_limit;
    Router::new()
        .route("/health", get(health))
        .route("/extract-embedding", post(extract_embedding))
        .route("/compare-voices", post(compare_voices))
        .route("/find-match", post(find_match))
        .route("/detect-language", post(detect_language))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Binds the configured address and serves until the process exits.
/// With `eager`, the models are loaded before the listener opens.
pub async fn run(config: Config, eager: bool) -> Result<()> {
    let addr = config.socket_addr()?;
    let state = AppState::from_config(config);
    if eager {
        state
            .matcher()
            .await
            .map_err(|e| anyhow::anyhow!("load models: {e}"))?;
    }

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "voicematch listening");
    serve(listener, state).await
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let models_loaded = state.matcher().await.is_ok();
    Json(HealthResponse {
        status: "healthy",
        models_loaded,
    })
}

async fn extract_embedding(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractResponse>, ApiError> {
    let audio = read_audio(multipart).await?;
    let matcher = state.matcher().await?;
    let sample_rate = state.config().models.sample_rate;

    let extraction = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let samples = voicematch_audio::load_mono(&audio, sample_rate)?;
        Ok(matcher.extract_embedding(&samples)?)
    })
    .await??;

    Ok(Json(ExtractResponse {
        success: true,
        embedding_size: extraction.embedding.len(),
        embedding: extraction.embedding,
        language: extraction.language,
        confidence: extraction.confidence,
        model: extraction.model,
    }))
}

async fn compare_voices(
    State(state): State<AppState>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<CompareResponse>, ApiError> {
    let Json(req) = payload?;
    let (Some(a), Some(b)) = (req.embedding1, req.embedding2) else {
        return Err(ApiError::BadRequest(NEED_EMBEDDINGS.into()));
    };
    let (a, b) = (a.unwrap_or_default(), b.unwrap_or_default());

    let matcher = state.matcher().await?;
    let similarity = matcher.compare_embeddings(&a, &b)?;
    Ok(Json(CompareResponse {
        success: true,
        similarity,
        is_match: matcher.is_match(similarity),
    }))
}

async fn find_match(
    State(state): State<AppState>,
    payload: Result<Json<FindMatchRequest>, JsonRejection>,
) -> Result<Json<FindMatchResponse>, ApiError> {
    let Json(req) = payload?;
    let (Some(query), Some(candidates)) = (req.user_embedding, req.stored_embeddings) else {
        return Err(ApiError::BadRequest(NEED_MATCH_INPUT.into()));
    };
    let (query, candidates) = (query.unwrap_or_default(), candidates.unwrap_or_default());
    let top_n = match req.top_n {
        None => state.config().matching.default_top_n,
        Some(n) => n.unwrap_or(usize::MAX),
    };

    let matcher = state.matcher().await?;
    let outcome = matcher.find_closest_match(&query, &candidates)?;
    info!(
        candidates = candidates.len(),
        best_similarity = outcome.best_similarity,
        "ranked stored voices"
    );

    let top_matches = outcome.top(top_n).to_vec();
    Ok(Json(FindMatchResponse {
        success: true,
        best_match: BestMatch {
            is_match: outcome.best_id.is_some() && matcher.is_match(outcome.best_similarity),
            id: outcome.best_id,
            similarity: outcome.best_similarity,
        },
        top_matches,
    }))
}

async fn detect_language(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    let audio = read_audio(multipart).await?;
    let matcher = state.matcher().await?;
    let sample_rate = state.config().models.sample_rate;

    let detection = tokio::task::spawn_blocking(move || {
        match voicematch_audio::load_mono(&audio, sample_rate) {
            Ok(samples) => matcher.detect_language(&samples),
            Err(e) => {
                warn!(error = %e, "cannot decode audio for language detection");
                Detection::unknown()
            }
        }
    })
    .await?;

    Ok(Json(DetectResponse {
        success: true,
        language: detection.language,
        confidence: detection.confidence,
    }))
}

/// Reads the `audio` field of a multipart upload.
async fn read_audio(multipart: Result<Multipart, MultipartRejection>) -> Result<Bytes, ApiError> {
    let Ok(mut multipart) = multipart else {
        return Err(ApiError::BadRequest(NO_AUDIO.into()));
    };
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("audio") {
            let data = field.bytes().await?;
            info!(bytes = data.len(), "received audio upload");
            return Ok(data);
        }
    }
    Err(ApiError::BadRequest(NO_AUDIO.into()))
}
