// ============================================================================
// PulmoScan - Externalized Configuration
// ============================================================================
// Settings come from an optional TOML file (path in MEDICAL_AI_CONFIG,
// default ./config.toml) with serde-level defaults for every field. The
// Gemini credential is environment-only and never serialized.
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listen port (default: 5001)
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Bind address (default: 127.0.0.1)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Segmentation network weights
    #[serde(default = "default_segmentation_model_path")]
    pub segmentation_model_path: String,

    /// Gradient-boosted risk classifier
    #[serde(default = "default_risk_model_path")]
    pub risk_model_path: String,

    /// Feature scaler paired with the risk classifier
    #[serde(default = "default_scaler_path")]
    pub scaler_path: String,

    /// Stage classification network weights
    #[serde(default = "default_stage_model_path")]
    pub stage_model_path: String,

    /// Gemini model identifier
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Input edge length for the segmentation network
    #[serde(default = "default_image_size")]
    pub image_size: u32,

    /// Default mask binarization threshold
    #[serde(default = "default_threshold")]
    pub threshold_default: f32,

    /// Cap on extracted recommendation lines
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
}

fn default_http_port() -> u16 {
    5001
}
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}
fn default_segmentation_model_path() -> String {
    "models/tumor_segmentation.json".to_string()
}
fn default_risk_model_path() -> String {
    "models/lung_cancer_gbdt.json".to_string()
}
fn default_scaler_path() -> String {
    "models/lung_cancer_scaler.json".to_string()
}
fn default_stage_model_path() -> String {
    "models/cancer_stage_cls.json".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_image_size() -> u32 {
    256
}
fn default_threshold() -> f32 {
    0.5
}
fn default_max_recommendations() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            bind_address: default_bind_address(),
            log_level: default_log_level(),
            cors_origins: default_cors_origins(),
            segmentation_model_path: default_segmentation_model_path(),
            risk_model_path: default_risk_model_path(),
            scaler_path: default_scaler_path(),
            stage_model_path: default_stage_model_path(),
            gemini_model: default_gemini_model(),
            image_size: default_image_size(),
            threshold_default: default_threshold(),
            max_recommendations: default_max_recommendations(),
        }
    }
}

impl AppConfig {
    /// Configuration file path (MEDICAL_AI_CONFIG overrides ./config.toml)
    pub fn config_path() -> PathBuf {
        std::env::var("MEDICAL_AI_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }

    /// Log level from the config file, read without logging. The logger has
    /// to be initialized before `load` so the load messages are not dropped,
    /// which means the level must be known first.
    pub fn peek_log_level() -> String {
        fs::read_to_string(Self::config_path())
            .ok()
            .and_then(|content| toml::from_str::<AppConfig>(&content).ok())
            .map(|config| config.log_level)
            .unwrap_or_else(default_log_level)
    }

    /// Loads the configuration from the TOML file or falls back to defaults.
    pub fn load() -> Self {
        let path = Self::config_path();
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        log::info!("[Config] Loaded from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        log::warn!("[Config] Parse error in {:?} ({}), using defaults", path, e);
                    }
                },
                Err(e) => {
                    log::warn!("[Config] Cannot read {:?} ({}), using defaults", path, e);
                }
            }
        } else {
            log::info!("[Config] No config file, using defaults");
        }
        Self::default()
    }
}

/// Global configuration (thread-safe, loaded once).
pub fn get_config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::load)
}

/// Gemini credential from the environment. Absence disables the generative
/// strategy rather than crashing.
pub fn get_gemini_api_key() -> Option<String> {
    std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty())
}
