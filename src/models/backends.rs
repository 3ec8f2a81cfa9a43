// ============================================================================
// PulmoScan - Bundled Model Backends
// ============================================================================
// Reference implementations of the model traits, loadable from plain JSON
// artifacts. Deployments with heavier runtimes swap these out by
// implementing the traits in `models`; everything above the trait seam is
// runtime-agnostic.
// ============================================================================

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, Array4};
use serde::Deserialize;

use super::{FeatureScaler, ModelError, RiskNet, SegmentationNet, StageNet};

fn read_json<T: serde::de::DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ModelError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| ModelError::Load(format!("cannot read {:?}: {}", path, e)))?;
    serde_json::from_str(&content)
        .map_err(|e| ModelError::Load(format!("cannot parse {:?}: {}", path, e)))
}

// ============================================================================
// Standard scaler
// ============================================================================

/// Pre-fitted standardization: `(x - mean) / scale`, per feature, in the
/// training field order.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

impl StandardScaler {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let scaler: Self = read_json(path)?;
        if scaler.mean.len() != scaler.scale.len() {
            return Err(ModelError::Load(format!(
                "scaler mean/scale length mismatch: {} vs {}",
                scaler.mean.len(),
                scaler.scale.len()
            )));
        }
        Ok(scaler)
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, features: &[f32]) -> Result<Vec<f32>, ModelError> {
        if features.len() != self.mean.len() {
            return Err(ModelError::InvalidInput(format!(
                "expected {} features, got {}",
                self.mean.len(),
                features.len()
            )));
        }
        Ok(features
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(&x, (&m, &s))| if s != 0.0 { (x - m) / s } else { x - m })
            .collect())
    }
}

// ============================================================================
// Gradient-boosted tree ensemble
// ============================================================================

/// One node of a regression tree. `left < 0` marks a leaf; interior nodes
/// route `x[feature] < threshold` to `left`, else to `right`.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub feature: usize,
    #[serde(default)]
    pub threshold: f32,
    #[serde(default = "leaf_marker")]
    pub left: i64,
    #[serde(default = "leaf_marker")]
    pub right: i64,
    #[serde(default)]
    pub value: f32,
}

fn leaf_marker() -> i64 {
    -1
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    /// Class whose margin this tree contributes to.
    pub class: usize,
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    fn score(&self, features: &[f32]) -> Result<f32, ModelError> {
        let mut idx = 0usize;
        loop {
            let node = self
                .nodes
                .get(idx)
                .ok_or_else(|| ModelError::Inference(format!("tree node {} out of range", idx)))?;
            if node.left < 0 {
                return Ok(node.value);
            }
            let x = features.get(node.feature).copied().ok_or_else(|| {
                ModelError::InvalidInput(format!("feature index {} out of range", node.feature))
            })?;
            idx = if x < node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }
}

/// Gradient-boosted multiclass classifier: per-class margins are summed over
/// the class's trees and the argmax class index is returned.
#[derive(Debug, Clone, Deserialize)]
pub struct GbdtClassifier {
    pub n_classes: usize,
    #[serde(default)]
    pub base_score: f32,
    pub trees: Vec<Tree>,
}

impl GbdtClassifier {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let model: Self = read_json(path)?;
        if model.n_classes == 0 {
            return Err(ModelError::Load("classifier declares zero classes".into()));
        }
        if let Some(tree) = model.trees.iter().find(|t| t.class >= model.n_classes) {
            return Err(ModelError::Load(format!(
                "tree targets class {} but model has {} classes",
                tree.class, model.n_classes
            )));
        }
        Ok(model)
    }

    fn margins(&self, features: &[f32]) -> Result<Vec<f32>, ModelError> {
        let mut margins = vec![self.base_score; self.n_classes];
        for tree in &self.trees {
            margins[tree.class] += tree.score(features)?;
        }
        Ok(margins)
    }
}

impl RiskNet for GbdtClassifier {
    fn predict(&self, features: &[f32]) -> Result<usize, ModelError> {
        let margins = self.margins(features)?;
        let best = margins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .ok_or_else(|| ModelError::Inference("empty margin vector".into()))?;
        Ok(best)
    }
}

// ============================================================================
// Dense network backends for the vision models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Softmax,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DenseLayer {
    /// Row-major `[out, in]` weight matrix.
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

/// Dense feed-forward network over a flattened input tensor.
#[derive(Debug, Clone, Deserialize)]
pub struct MlpBackend {
    pub layers: Vec<DenseLayer>,
}

impl MlpBackend {
    pub fn forward(&self, input: &[f32]) -> Result<Vec<f32>, ModelError> {
        let mut current = Array1::from_vec(input.to_vec());
        for (i, layer) in self.layers.iter().enumerate() {
            let rows = layer.weights.len();
            let cols = layer.weights.first().map(|r| r.len()).unwrap_or(0);
            if cols != current.len() || layer.bias.len() != rows {
                return Err(ModelError::InvalidInput(format!(
                    "layer {}: weights {}x{} incompatible with input of {}",
                    i,
                    rows,
                    cols,
                    current.len()
                )));
            }
            let flat: Vec<f32> = layer.weights.iter().flatten().copied().collect();
            let w = Array2::from_shape_vec((rows, cols), flat)
                .map_err(|e| ModelError::Load(format!("layer {}: {}", i, e)))?;
            let mut out = w.dot(&current) + Array1::from_vec(layer.bias.clone());
            match layer.activation {
                Activation::Linear => {}
                Activation::Relu => out.mapv_inplace(|v| v.max(0.0)),
                Activation::Sigmoid => out.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp())),
                Activation::Softmax => {
                    let max = out.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    out.mapv_inplace(|v| (v - max).exp());
                    let sum = out.sum();
                    if sum > 0.0 {
                        out.mapv_inplace(|v| v / sum);
                    }
                }
            }
            current = out;
        }
        Ok(current.to_vec())
    }
}

/// Segmentation head: flattened grayscale input, per-pixel probability map
/// reshaped to `output_shape`.
#[derive(Debug, Clone, Deserialize)]
pub struct MlpSegmentationNet {
    #[serde(flatten)]
    pub net: MlpBackend,
    /// `[height, width]` of the produced probability map.
    pub output_shape: [usize; 2],
}

impl MlpSegmentationNet {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        read_json(path)
    }
}

impl SegmentationNet for MlpSegmentationNet {
    fn infer(&self, input: &Array4<f32>) -> Result<Array2<f32>, ModelError> {
        let flat: Vec<f32> = input.iter().copied().collect();
        let output = self.net.forward(&flat)?;
        let [h, w] = self.output_shape;
        if output.len() != h * w {
            return Err(ModelError::ContractViolation(format!(
                "segmentation output has {} values, expected {}x{}",
                output.len(),
                h,
                w
            )));
        }
        Array2::from_shape_vec((h, w), output)
            .map_err(|e| ModelError::Inference(e.to_string()))
    }
}

/// Stage classification head: flattened RGB input, per-class probabilities.
#[derive(Debug, Clone, Deserialize)]
pub struct MlpStageNet {
    #[serde(flatten)]
    pub net: MlpBackend,
}

impl MlpStageNet {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        read_json(path)
    }
}

impl StageNet for MlpStageNet {
    fn infer(&self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError> {
        let flat: Vec<f32> = input.iter().copied().collect();
        self.net.forward(&flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaler_standardizes_per_feature() {
        let scaler = StandardScaler {
            mean: vec![1.0, 2.0],
            scale: vec![2.0, 0.0],
        };
        let out = scaler.transform(&[3.0, 5.0]).unwrap();
        assert_eq!(out, vec![1.0, 3.0]);
    }

    #[test]
    fn scaler_rejects_wrong_arity() {
        let scaler = StandardScaler {
            mean: vec![0.0; 3],
            scale: vec![1.0; 3],
        };
        assert!(scaler.transform(&[1.0]).is_err());
    }

    fn stump(class: usize, feature: usize, threshold: f32, lo: f32, hi: f32) -> Tree {
        Tree {
            class,
            nodes: vec![
                TreeNode {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                    value: 0.0,
                },
                TreeNode {
                    feature: 0,
                    threshold: 0.0,
                    left: -1,
                    right: -1,
                    value: lo,
                },
                TreeNode {
                    feature: 0,
                    threshold: 0.0,
                    left: -1,
                    right: -1,
                    value: hi,
                },
            ],
        }
    }

    #[test]
    fn gbdt_routes_and_argmaxes() {
        // Class 1 wins iff feature 0 >= 0.5, class 0 otherwise.
        let model = GbdtClassifier {
            n_classes: 2,
            base_score: 0.0,
            trees: vec![stump(0, 0, 0.5, 2.0, -2.0), stump(1, 0, 0.5, -2.0, 2.0)],
        };
        assert_eq!(model.predict(&[0.0]).unwrap(), 0);
        assert_eq!(model.predict(&[1.0]).unwrap(), 1);
    }

    #[test]
    fn mlp_softmax_sums_to_one() {
        let net = MlpBackend {
            layers: vec![DenseLayer {
                weights: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
                bias: vec![0.0, 0.0, 0.0],
                activation: Activation::Softmax,
            }],
        };
        let out = net.forward(&[1.0, 2.0]).unwrap();
        assert_eq!(out.len(), 3);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn mlp_rejects_shape_mismatch() {
        let net = MlpBackend {
            layers: vec![DenseLayer {
                weights: vec![vec![1.0, 0.0]],
                bias: vec![0.0],
                activation: Activation::Linear,
            }],
        };
        assert!(net.forward(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn segmentation_net_reshapes_to_map() {
        let net = MlpSegmentationNet {
            net: MlpBackend {
                layers: vec![DenseLayer {
                    weights: vec![vec![1.0]; 4],
                    bias: vec![0.0; 4],
                    activation: Activation::Sigmoid,
                }],
            },
            output_shape: [2, 2],
        };
        let input = Array4::from_elem((1, 1, 1, 1), 0.0);
        let map = net.infer(&input).unwrap();
        assert_eq!(map.dim(), (2, 2));
        assert!((map[[0, 0]] - 0.5).abs() < 1e-6);
    }
}
