// ============================================================================
// PulmoScan - Tumor Segmentation
// ============================================================================

use image::DynamicImage;
use ndarray::Array2;
use serde::Serialize;

use crate::error::ApiError;
use crate::imaging;

use super::ModelRegistry;

/// Result of running the segmentation network over a CT scan.
///
/// Invariant: `tumor_area == 0.0` implies `has_tumor == false` and
/// `mask_image == None`.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentationResult {
    pub has_tumor: bool,
    /// Percentage of the image area covered by mask pixels above threshold.
    pub tumor_area: f64,
    /// Percentage confidence derived from the mask's peak probability.
    pub confidence: f64,
    /// PNG data URL of the binary mask, present iff a tumor was found.
    pub mask_image: Option<String>,
}

/// Runs segmentation over an uploaded image and builds the full result.
pub fn predict_tumor(
    registry: &ModelRegistry,
    image: &DynamicImage,
    size: u32,
    threshold: f32,
) -> Result<SegmentationResult, ApiError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ApiError::InvalidInput(format!(
            "threshold must be in [0, 1], got {}",
            threshold
        )));
    }
    let tensor = imaging::grayscale_tensor(image, size);
    let probabilities = registry.segmentation.infer(&tensor)?;
    build_result(&probabilities, threshold)
}

/// Turns a raw probability map into the thresholded result.
///
/// A pixel is foreground iff its probability strictly exceeds the threshold.
/// When no pixel qualifies, confidence is still computed from the raw peak
/// probability (as background confidence), however low that peak is.
pub fn build_result(
    probabilities: &Array2<f32>,
    threshold: f32,
) -> Result<SegmentationResult, ApiError> {
    let total = probabilities.len();
    if total == 0 {
        return Err(ApiError::ModelContract(
            "segmentation produced an empty probability map".into(),
        ));
    }

    let mask = probabilities.mapv(|p| u8::from(p > threshold));
    let foreground = mask.iter().filter(|&&v| v == 1).count();
    let tumor_area = 100.0 * foreground as f64 / total as f64;
    let has_tumor = foreground > 0;

    let max_prob = probabilities
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max) as f64;
    let confidence = if has_tumor {
        max_prob * 100.0
    } else {
        (1.0 - max_prob) * 100.0
    };

    let mask_image = if has_tumor {
        Some(imaging::mask_to_data_url(&mask)?)
    } else {
        None
    };

    Ok(SegmentationResult {
        has_tumor,
        tumor_area,
        confidence,
        mask_image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn pixel_above_threshold_means_tumor() {
        let probs = array![[0.1_f32, 0.2], [0.9, 0.3]];
        let result = build_result(&probs, 0.5).unwrap();
        assert!(result.has_tumor);
        assert!((result.tumor_area - 25.0).abs() < 1e-9);
        assert!((result.confidence - 90.0).abs() < 1e-4);
        assert!(result.mask_image.is_some());
    }

    #[test]
    fn threshold_comparison_is_strict() {
        let probs = array![[0.5_f32, 0.5], [0.5, 0.5]];
        let result = build_result(&probs, 0.5).unwrap();
        assert!(!result.has_tumor);
        assert_eq!(result.tumor_area, 0.0);
        assert!(result.mask_image.is_none());
    }

    #[test]
    fn no_tumor_confidence_comes_from_background() {
        let probs = array![[0.1_f32, 0.3], [0.2, 0.05]];
        let result = build_result(&probs, 0.5).unwrap();
        assert!(!result.has_tumor);
        // 100 * (1 - 0.3)
        assert!((result.confidence - 70.0).abs() < 1e-4);
    }

    #[test]
    fn all_zero_mask_keeps_raw_peak_rule() {
        // Peak of 0.45 just below threshold: background confidence is a
        // modest 55%, a direct consequence of the threshold rule.
        let probs = array![[0.45_f32, 0.4], [0.1, 0.0]];
        let result = build_result(&probs, 0.5).unwrap();
        assert!(!result.has_tumor);
        assert!((result.confidence - 55.0).abs() < 1e-4);
    }

    #[test]
    fn zero_area_implies_no_tumor_and_no_mask() {
        for threshold in [0.0_f32, 0.3, 0.7, 1.0] {
            let probs = Array2::<f32>::zeros((4, 4));
            let result = build_result(&probs, threshold).unwrap();
            assert_eq!(result.tumor_area, 0.0);
            assert!(!result.has_tumor);
            assert!(result.mask_image.is_none());
        }
    }
}
