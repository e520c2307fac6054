//! Error types for the accent analyzer.
//!
//! Every pipeline stage fails fast with a typed [`AnalysisError`]. The
//! orchestrator never retries or downgrades these; they are surfaced to the
//! caller unchanged, which is why each variant carries a stable kind string
//! that the HTTP boundary serialises as `{ error_kind, message }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Primary error type, covering every way a classification request can fail.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisError {
    /// The audio source could not be fetched (unreachable, unsupported, timed out).
    #[error("Download failed: {0}")]
    Download(String),

    /// The byte stream could not be decoded as audio.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The normalised clip is shorter than the minimum usable duration.
    #[error("Audio too short: {duration_secs:.2}s (minimum {min_secs:.2}s)")]
    AudioTooShort {
        /// Duration of the normalised clip.
        duration_secs: f64,
        /// Configured minimum duration.
        min_secs: f64,
    },

    /// Numerical failure while computing or aggregating features.
    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),

    /// The raw-score mapping was empty or malformed.
    #[error("Classification failed: {0}")]
    Classification(String),

    /// The request was cancelled between pipeline stages.
    #[error("Request cancelled during {0}")]
    Cancelled(String),

    /// Invalid request parameters at the boundary.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Too many requests in flight.
    #[error("Service capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Invalid configuration or profile table.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure (task join errors and the like).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Stable, machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Download(_) => "DownloadError",
            AnalysisError::UnsupportedFormat(_) => "UnsupportedFormatError",
            AnalysisError::AudioTooShort { .. } => "AudioTooShortError",
            AnalysisError::FeatureExtraction(_) => "FeatureExtractionError",
            AnalysisError::Classification(_) => "ClassificationError",
            AnalysisError::Cancelled(_) => "Cancelled",
            AnalysisError::InvalidRequest(_) => "InvalidRequest",
            AnalysisError::CapacityExceeded(_) => "CapacityExceeded",
            AnalysisError::Configuration(_) => "ConfigurationError",
            AnalysisError::Internal(_) => "InternalError",
        }
    }

    /// Convert into the failure record returned at the boundary.
    pub fn to_failure(&self) -> FailureRecord {
        FailureRecord {
            error_kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AnalysisError::Download(_) => StatusCode::BAD_GATEWAY,
            AnalysisError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AnalysisError::AudioTooShort { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AnalysisError::FeatureExtraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AnalysisError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AnalysisError::CapacityExceeded(_) => StatusCode::SERVICE_UNAVAILABLE,
            AnalysisError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
            AnalysisError::Classification(_)
            | AnalysisError::Configuration(_)
            | AnalysisError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Serialised failure outcome: `{ error_kind, message }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stable error kind, see [`AnalysisError::kind`].
    pub error_kind: String,
    /// Human-readable message.
    pub message: String,
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_failure())).into_response()
    }
}

/// Convenience type alias for Results with AnalysisError.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Run an async operation under a deadline, converting both its error and an
/// expired deadline with the supplied converter.
///
/// The converter receives `None` on timeout so callers decide which error kind
/// a slow collaborator maps to.
pub async fn with_timeout_and_convert<T, E, F, C>(
    operation: F,
    timeout_duration: Duration,
    error_converter: C,
) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    C: FnOnce(Option<E>) -> AnalysisError,
{
    match tokio::time::timeout(timeout_duration, operation).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(error_converter(Some(e))),
        Err(_) => Err(error_converter(None)),
    }
}
