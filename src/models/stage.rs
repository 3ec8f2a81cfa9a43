// ============================================================================
// PulmoScan - Cancer Stage Classification
// ============================================================================

use image::DynamicImage;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::imaging;

use super::ModelRegistry;

/// Class labels in the network's output order.
pub const STAGE_CLASSES: [&str; 3] = ["Benign", "Malignant", "Normal"];

/// Top-1 stage prediction with the full per-class distribution.
#[derive(Debug, Clone, Serialize)]
pub struct StagePrediction {
    pub predicted_class: String,
    /// Probability of the winning class, in [0, 1].
    pub confidence: f64,
    /// Label -> probability, in output order.
    pub class_probabilities: Map<String, Value>,
    pub is_normal: bool,
    pub is_benign: bool,
    pub is_malignant: bool,
}

/// Classifies a CT scan into Benign / Malignant / Normal.
pub fn predict_stage(
    registry: &ModelRegistry,
    image: &DynamicImage,
    size: u32,
) -> Result<StagePrediction, ApiError> {
    let tensor = imaging::rgb_tensor(image, size);
    let probabilities = registry.stage.infer(&tensor)?;
    build_prediction(&probabilities)
}

/// Decodes a probability vector into the labeled prediction.
pub fn build_prediction(probabilities: &[f32]) -> Result<StagePrediction, ApiError> {
    if probabilities.len() != STAGE_CLASSES.len() {
        return Err(ApiError::ModelContract(format!(
            "stage classifier returned {} probabilities, expected {}",
            probabilities.len(),
            STAGE_CLASSES.len()
        )));
    }

    let (best_index, best_prob) = probabilities
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| ApiError::ModelContract("empty probability vector".into()))?;

    let predicted_class = STAGE_CLASSES[best_index].to_string();
    let mut class_probabilities = Map::new();
    for (label, &p) in STAGE_CLASSES.iter().zip(probabilities) {
        class_probabilities.insert(label.to_string(), Value::from(p as f64));
    }

    Ok(StagePrediction {
        is_normal: predicted_class == "Normal",
        is_benign: predicted_class == "Benign",
        is_malignant: predicted_class == "Malignant",
        predicted_class,
        confidence: best_prob as f64,
        class_probabilities,
    })
}
