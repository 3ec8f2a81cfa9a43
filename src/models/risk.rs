// ============================================================================
// PulmoScan - Lung Cancer Risk Assessment
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;

use super::ModelRegistry;

/// Field order of the trained risk model. The feature vector MUST be
/// assembled in exactly this order before scaling; the scaler was fitted on
/// the same layout.
pub const FEATURE_ORDER: [&str; 23] = [
    "age",
    "gender",
    "air_pollution",
    "alcohol_use",
    "dust_allergy",
    "occupational_hazards",
    "genetic_risk",
    "chronic_lung_disease",
    "balanced_diet",
    "obesity",
    "smoking",
    "passive_smoker",
    "chest_pain",
    "coughing_of_blood",
    "fatigue",
    "weight_loss",
    "shortness_of_breath",
    "wheezing",
    "swallowing_difficulty",
    "clubbing_of_finger_nails",
    "frequent_cold",
    "dry_cough",
    "snoring",
];

/// Risk category decoded from the classifier's output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLabel {
    Low,
    Medium,
    High,
}

impl RiskLabel {
    /// Fixed {0: Low, 1: Medium, 2: High} mapping. There is deliberately no
    /// default arm: anything else is a broken model artifact.
    pub fn from_class_index(index: usize) -> Result<Self, ApiError> {
        match index {
            0 => Ok(RiskLabel::Low),
            1 => Ok(RiskLabel::Medium),
            2 => Ok(RiskLabel::High),
            other => Err(ApiError::ModelContract(format!(
                "risk classifier returned class index {} outside {{0, 1, 2}}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Low => "Low",
            RiskLabel::Medium => "Medium",
            RiskLabel::High => "High",
        }
    }
}

impl std::fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub prediction: RiskLabel,
}

/// Assembles the feature vector in training order. Missing or non-numeric
/// fields default to 0 — robustness over strictness is intentional here.
pub fn assemble_features(data: &Map<String, Value>) -> Vec<f32> {
    FEATURE_ORDER
        .iter()
        .map(|name| {
            data.get(*name)
                .and_then(Value::as_f64)
                .unwrap_or(0.0) as f32
        })
        .collect()
}

/// Scales the patient record and classifies it into a risk category.
pub fn assess(
    registry: &ModelRegistry,
    data: &Map<String, Value>,
) -> Result<RiskAssessment, ApiError> {
    let features = assemble_features(data);
    let scaled = registry.scaler.transform(&features)?;
    let class_index = registry.risk.predict(&scaled)?;
    let prediction = RiskLabel::from_class_index(class_index)?;
    Ok(RiskAssessment { prediction })
}
