// ============================================================================
// PulmoScan - Entry Point
// ============================================================================

use std::sync::Arc;

use pulmoscan::config::{self, get_config, AppConfig};
use pulmoscan::gemini::GeminiClient;
use pulmoscan::http_server;
use pulmoscan::models::ModelRegistry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // The logger goes up before the config load so the load messages are
    // visible; RUST_LOG still wins over the configured level.
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(AppConfig::peek_log_level()),
    )
    .init();

    let config = get_config();

    log::info!("[Main] PulmoScan {} starting", env!("CARGO_PKG_VERSION"));
    log::info!(
        "[Main] Config: bind={}:{}, image_size={}, gemini_model={}",
        config.bind_address,
        config.http_port,
        config.image_size,
        config.gemini_model
    );

    // Models are mandatory; the server never starts half-loaded.
    let registry = match ModelRegistry::load(config) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            log::error!("[Main] Model loading failed: {}", e);
            std::process::exit(1);
        }
    };

    let ai = GeminiClient::from_config(config, config::get_gemini_api_key());

    http_server::start_server(config, registry, ai).await
}
