// ============================================================================
// PulmoScan - Gemini Client Errors
// ============================================================================

use thiserror::Error;

/// Failures from the generative text service.
///
/// Callers treat every variant the same way: log it and fall back to the
/// deterministic strategy. The variants exist for the logs, not for control
/// flow.
#[derive(Debug, Clone, Error)]
pub enum GeminiError {
    /// No API key in the environment: the generative strategy is disabled.
    #[error("Gemini API key is not configured")]
    MissingApiKey,

    /// Network-level failure (timeout, connection refused, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response from the API.
    #[error("HTTP {0}: {1}")]
    Http(u16, String),

    /// Response body did not match the expected schema.
    #[error("parse error: {0}")]
    Parse(String),

    /// Structurally valid response with no generated text in it.
    #[error("empty response from model")]
    EmptyResponse,
}

pub type GeminiResult<T> = Result<T, GeminiError>;
