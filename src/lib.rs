// ============================================================================
// PulmoScan - Medical AI Backend
// ============================================================================
// Lung cancer screening services: tumor segmentation, risk and stage
// classification, and AI-generated clinical recommendations in Vietnamese.
// ============================================================================

pub mod config;
pub mod error;
pub mod gemini;
pub mod http_server;
pub mod imaging;
pub mod models;
pub mod services;
