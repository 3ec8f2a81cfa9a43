// ============================================================================
// PulmoScan - API Error Taxonomy
// ============================================================================

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use thiserror::Error;

use crate::gemini::errors::GeminiError;
use crate::models::ModelError;

/// Errors surfaced at the HTTP boundary.
///
/// Adapters never swallow these: they propagate with `?` up to the handler,
/// where they become the standard `{error, status_code}` JSON body. The one
/// exception is `ExternalService` inside the recommendations handler, which
/// recovers by substituting the deterministic strategy.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request fields (400).
    #[error("{0}")]
    InvalidInput(String),

    /// Payload could not be decoded as an image. Currently answered as a
    /// prediction error (500) to match the existing API contract.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Inference produced output outside the expected category range.
    /// Fatal, no recovery.
    #[error("Model contract violation: {0}")]
    ModelContract(String),

    /// The external generation service failed or is unavailable.
    #[error("AI service error: {0}")]
    ExternalService(#[from] GeminiError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Standard error body shared by every endpoint.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status_code: u16,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidImage(_)
            | ApiError::ModelContract(_)
            | ApiError::ExternalService(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status()).json(ErrorResponse {
            error: self.to_string(),
            status_code: self.status().as_u16(),
        })
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::ContractViolation(msg) => ApiError::ModelContract(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_maps_to_400() {
        let err = ApiError::InvalidInput("No data provided".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn image_and_model_errors_map_to_500() {
        assert_eq!(
            ApiError::InvalidImage("not a png".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::ModelContract("class index 7".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn contract_violation_converts_from_model_error() {
        let err: ApiError = ModelError::ContractViolation("bad index".into()).into();
        assert!(matches!(err, ApiError::ModelContract(_)));
    }
}
