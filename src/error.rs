//! Error types for marginalia
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in marginalia
#[derive(Debug, Error)]
pub enum MarginaliaError {
    /// Model server unreachable or returned an error while listing models
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Generate call failed (non-2xx or transport error)
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Hard wall-clock timeout exceeded while waiting for a generation
    #[error("Model '{model}' timed out after {timeout_secs}s")]
    Timeout { model: String, timeout_secs: u64 },

    /// Generation succeeded but the model returned no text
    #[error("Model returned no content")]
    EmptyResponse,

    /// Selection found no post below its per-model quota
    #[error("No eligible post to comment on (per-post quota may be reached)")]
    NoEligiblePost,

    /// Model listing returned nothing after filtering by the allow-list
    #[error("No allowed models available")]
    NoAllowedModels,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MarginaliaError {
    /// True for conditions that mean "nothing to do right now" rather than
    /// a failed call. The background loop logs these at debug level.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            MarginaliaError::NoEligiblePost | MarginaliaError::NoAllowedModels
        )
    }
}

/// Result type alias for marginalia operations
pub type Result<T> = std::result::Result<T, MarginaliaError>;
