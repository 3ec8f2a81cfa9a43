// ============================================================================
// PulmoScan - Model Registry
// ============================================================================
// The three inference models and the feature scaler live behind trait seams:
// the rest of the crate consumes them as black-box `infer(input) -> output`
// functions. The registry is constructed once at startup, is immutable for
// the process lifetime, and is shared read-only across concurrent requests.
// ============================================================================

pub mod backends;
pub mod risk;
pub mod segmentation;
pub mod stage;

use std::sync::Arc;

use ndarray::{Array2, Array4};
use thiserror::Error;

use crate::config::AppConfig;
use backends::{GbdtClassifier, MlpSegmentationNet, MlpStageNet, StandardScaler};

/// Errors from model loading and inference backends.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model load error: {0}")]
    Load(String),

    #[error("invalid model input: {0}")]
    InvalidInput(String),

    #[error("inference error: {0}")]
    Inference(String),

    /// Output outside the contract agreed with the trained artifact
    /// (e.g. a class index with no label mapping). Fatal.
    #[error("{0}")]
    ContractViolation(String),
}

/// Tumor segmentation network: grayscale `[1, H, W, 1]` in, per-pixel
/// foreground probability map `[H, W]` out.
pub trait SegmentationNet: Send + Sync {
    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>, ModelError>;
}

/// Gradient-boosted risk classifier: scaled feature vector in, class index
/// out. The index is decoded by the adapter, not the backend.
pub trait RiskNet: Send + Sync {
    fn predict(&self, features: &[f32]) -> Result<usize, ModelError>;
}

/// Pre-fitted scaler paired with the risk classifier. Must be applied to the
/// exact same field order the classifier was trained on.
pub trait FeatureScaler: Send + Sync {
    fn transform(&self, features: &[f32]) -> Result<Vec<f32>, ModelError>;
}

/// Stage classification network: RGB `[1, H, W, 3]` in, per-class
/// probability vector out.
pub trait StageNet: Send + Sync {
    fn infer(&self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError>;
}

/// Immutable process-wide handles to the loaded models.
pub struct ModelRegistry {
    pub segmentation: Arc<dyn SegmentationNet>,
    pub risk: Arc<dyn RiskNet>,
    pub scaler: Arc<dyn FeatureScaler>,
    pub stage: Arc<dyn StageNet>,
}

impl ModelRegistry {
    pub fn new(
        segmentation: Arc<dyn SegmentationNet>,
        risk: Arc<dyn RiskNet>,
        scaler: Arc<dyn FeatureScaler>,
        stage: Arc<dyn StageNet>,
    ) -> Self {
        Self {
            segmentation,
            risk,
            scaler,
            stage,
        }
    }

    /// Loads all model artifacts from the configured paths. Called once in
    /// `main` before the server accepts requests.
    pub fn load(config: &AppConfig) -> Result<Self, ModelError> {
        let segmentation = MlpSegmentationNet::from_json_file(&config.segmentation_model_path)?;
        log::info!("[Models] Segmentation network loaded");

        let risk = GbdtClassifier::from_json_file(&config.risk_model_path)?;
        log::info!("[Models] Risk classifier loaded");

        let scaler = StandardScaler::from_json_file(&config.scaler_path)?;
        log::info!("[Models] Feature scaler loaded");

        let stage = MlpStageNet::from_json_file(&config.stage_model_path)?;
        log::info!("[Models] Stage classifier loaded");

        Ok(Self::new(
            Arc::new(segmentation),
            Arc::new(risk),
            Arc::new(scaler),
            Arc::new(stage),
        ))
    }
}
