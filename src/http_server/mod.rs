// ============================================================================
// PulmoScan - HTTP Server
// ============================================================================
// Exposes the prediction, recommendation and chat endpoints to the frontend.
// The model registry and Gemini client are built once in main and shared
// read-only across workers.
// ============================================================================

pub mod handlers;
pub mod metrics;
pub mod routes;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{from_fn, Logger};
use actix_web::{web, App, HttpServer};

use crate::config::AppConfig;
use crate::gemini::GeminiClient;
use crate::models::ModelRegistry;

/// Shared server state: immutable model handles and the generation client.
pub struct HttpServerState {
    pub registry: Arc<ModelRegistry>,
    pub ai: GeminiClient,
}

/// Starts the HTTP server and blocks until shutdown.
pub async fn start_server(
    config: &AppConfig,
    registry: Arc<ModelRegistry>,
    ai: GeminiClient,
) -> std::io::Result<()> {
    let state = web::Data::new(HttpServerState { registry, ai });
    let origins = config.cors_origins.clone();

    log::info!(
        "[HTTP Server] Listening on http://{}:{}",
        config.bind_address,
        config.http_port
    );

    metrics::Metrics::init();

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
            .max_age(3600);
        for origin in &origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(from_fn(metrics::record))
            .configure(routes::configure)
    })
    .bind((config.bind_address.clone(), config.http_port))?
    .run()
    .await
}
