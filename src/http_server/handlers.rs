// ============================================================================
// PulmoScan - HTTP Handlers
// ============================================================================
// Request bodies are parsed by hand from raw bytes so that every rejection
// goes through ApiError and keeps the `{error, status_code}` shape.
// ============================================================================

use actix_multipart::form::bytes::Bytes as UploadedFile;
use actix_multipart::form::text::Text;
use actix_multipart::form::MultipartForm;
use actix_web::{web, HttpResponse};
use log::warn;
use serde_json::{json, Value};

use crate::config::get_config;
use crate::error::ApiError;
use crate::imaging;
use crate::models::{risk, segmentation, stage};
use crate::services::chat::{chat_frames, ChatRequest};
use crate::services::fallback::fallback_recommendations;
use crate::services::recommendations::{generate_recommendations, RecommendationRequest};

use super::HttpServerState;

// ============================================================================
// STATUS
// ============================================================================

/// GET /health
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "message": "Medical AI API is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Medical AI API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "lung_cancer_prediction": "/api/predict/lung-cancer",
            "tumor_detection": "/api/predict/tumor",
            "cancer_stage": "/api/predict/cancer-stage",
            "chat": "/api/chat",
            "recommendations": "/api/recommendations"
        }
    }))
}

// ============================================================================
// PREDICTION
// ============================================================================

fn parse_json_body(body: &web::Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidInput(format!("Invalid JSON: {}", e)))
}

/// POST /api/predict/lung-cancer
pub async fn predict_lung_cancer(
    state: web::Data<HttpServerState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let data = parse_json_body(&body)?;
    let fields = data
        .as_object()
        .filter(|o| !o.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("No data provided".to_string()))?;

    let result = risk::assess(&state.registry, fields)?;
    Ok(HttpResponse::Ok().json(result))
}

#[derive(MultipartForm)]
pub struct TumorUpload {
    pub image: Option<UploadedFile>,
    pub threshold: Option<Text<String>>,
}

/// POST /api/predict/tumor
pub async fn predict_tumor(
    state: web::Data<HttpServerState>,
    MultipartForm(form): MultipartForm<TumorUpload>,
) -> Result<HttpResponse, ApiError> {
    let config = get_config();

    let upload = form
        .image
        .ok_or_else(|| ApiError::InvalidInput("No image provided".to_string()))?;
    let threshold = match &form.threshold {
        Some(raw) => raw
            .trim()
            .parse::<f32>()
            .map_err(|_| ApiError::InvalidInput(format!("Invalid threshold: {}", raw.0)))?,
        None => config.threshold_default,
    };

    let image = imaging::decode_image(&upload.data)?;
    let result = segmentation::predict_tumor(&state.registry, &image, config.image_size, threshold)?;
    Ok(HttpResponse::Ok().json(result))
}

#[derive(MultipartForm)]
pub struct StageUpload {
    pub image: Option<UploadedFile>,
}

/// POST /api/predict/cancer-stage
pub async fn predict_cancer_stage(
    state: web::Data<HttpServerState>,
    MultipartForm(form): MultipartForm<StageUpload>,
) -> Result<HttpResponse, ApiError> {
    let upload = form
        .image
        .ok_or_else(|| ApiError::InvalidInput("No image provided".to_string()))?;

    let image = imaging::decode_image(&upload.data)?;
    let result = stage::predict_stage(&state.registry, &image, get_config().image_size)?;
    Ok(HttpResponse::Ok().json(result))
}

// ============================================================================
// CLINICAL TEXT
// ============================================================================

/// POST /api/recommendations
///
/// Always answers 200 on well-formed input: a generative failure is logged
/// and silently replaced by the deterministic strategy.
pub async fn recommendations(
    state: web::Data<HttpServerState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let data = parse_json_body(&body)?;
    if !data.as_object().is_some_and(|o| !o.is_empty()) {
        return Err(ApiError::InvalidInput("No data provided".to_string()));
    }
    let request: RecommendationRequest = serde_json::from_value(data)
        .map_err(|e| ApiError::InvalidInput(format!("Malformed request: {}", e)))?;

    let max = get_config().max_recommendations;
    let result = match generate_recommendations(&state.ai, &request, max).await {
        Ok(result) => result,
        Err(e) => {
            warn!("[Recommendations] Generative strategy failed ({}), using fallback", e);
            fallback_recommendations(&request)
        }
    };

    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/chat - SSE-style stream of `data: {...}` frames
pub async fn chat(
    state: web::Data<HttpServerState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let data = parse_json_body(&body)?;
    if data.get("message").is_none() {
        return Err(ApiError::InvalidInput("No message provided".to_string()));
    }
    let request: ChatRequest = serde_json::from_value(data)
        .map_err(|e| ApiError::InvalidInput(format!("Malformed request: {}", e)))?;

    let frames = chat_frames(&state.ai, &request).await;
    let stream = futures_util::stream::iter(
        frames
            .into_iter()
            .map(|f| Ok::<_, std::convert::Infallible>(web::Bytes::from(f))),
    );

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .streaming(stream))
}
