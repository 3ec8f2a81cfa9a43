// ============================================================================
// PulmoScan - HTTP Routes
// ============================================================================

use actix_web::web;

use super::{handlers, metrics};

/// Configures every route served by the API.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Status endpoints
        .route("/", web::get().to(handlers::root))
        .route("/health", web::get().to(handlers::health_check))
        .route("/metrics", web::get().to(metrics::metrics_handler))
        // Prediction API
        .route(
            "/api/predict/lung-cancer",
            web::post().to(handlers::predict_lung_cancer),
        )
        .route("/api/predict/tumor", web::post().to(handlers::predict_tumor))
        .route(
            "/api/predict/cancer-stage",
            web::post().to(handlers::predict_cancer_stage),
        )
        // Clinical text API
        .route(
            "/api/recommendations",
            web::post().to(handlers::recommendations),
        )
        .route("/api/chat", web::post().to(handlers::chat));
}
