// ============================================================================
// PulmoScan - Gemini HTTP Client
// ============================================================================
// Thin client for the Gemini generateContent REST API. Built once at startup
// and shared across handlers; a missing API key produces a client that always
// answers `MissingApiKey`, which the handlers translate into the
// deterministic fallback strategy.
// ============================================================================

pub mod errors;
pub mod models;

use std::time::Duration;

use log::{debug, info};

use crate::config::AppConfig;
use errors::{GeminiError, GeminiResult};
use models::{Content, GenerateContentRequest, GenerateContentResponse};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const CONNECT_TIMEOUT_SECS: u64 = 10;

// No Debug derive: the struct holds the API credential.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(2)
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig, api_key: Option<String>) -> Self {
        if api_key.is_some() {
            info!("[Gemini] Client ready (model={})", config.gemini_model);
        } else {
            info!("[Gemini] No API key, generative strategy disabled");
        }
        Self::new(api_key, config.gemini_model.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Sends a multi-turn request and returns the first candidate's text.
    pub async fn generate(&self, contents: Vec<Content>) -> GeminiResult<String> {
        let api_key = self.api_key.as_deref().ok_or(GeminiError::MissingApiKey)?;
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );

        debug!(
            "[Gemini] generateContent: model={}, turns={}",
            self.model,
            contents.len()
        );

        let response = self
            .http
            .post(&url)
            .json(&GenerateContentRequest { contents })
            .send()
            .await
            .map_err(|e| GeminiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Http(status, body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GeminiError::Parse(e.to_string()))?;

        parsed.first_text().ok_or(GeminiError::EmptyResponse)
    }
}
