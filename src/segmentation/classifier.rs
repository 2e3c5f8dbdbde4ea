use super::features::with_workers;
use super::types::PixelClass;
use crate::error::SegmentationError;
use anyhow::{bail, Result};
use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Per-pixel class model.
///
/// Implementations are immutable once constructed and are shared across
/// frames behind an `Arc`, so `predict` must not depend on earlier calls.
pub trait Classifier: Send + Sync {
    /// Map an `n_samples x n_features` matrix to `n_samples x n_classes`
    /// probabilities, columns ordered as [`PixelClass`].
    fn predict(&self, features: ArrayView2<f32>, workers: usize) -> Result<Array2<f32>>;

    fn n_classes(&self) -> usize {
        PixelClass::COUNT
    }

    /// Short backend name for logs
    fn name(&self) -> &str;
}

/// Load a classifier, choosing the backend from the file extension.
///
/// `.json` files are decision forests; `.onnx` files need the `onnx`
/// feature.
pub fn load_classifier<P: AsRef<Path>>(path: P) -> Result<Arc<dyn Classifier>, SegmentationError> {
    let path = path.as_ref();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Arc::new(ForestClassifier::load(path)?)),
        #[cfg(feature = "onnx")]
        Some("onnx") => Ok(Arc::new(super::onnx::OnnxClassifier::load(path)?)),
        other => Err(SegmentationError::model_load(
            path,
            format!("unsupported model format {:?}", other.unwrap_or("")),
        )),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f32>,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Class distribution of the leaf `sample` falls into.
    fn leaf(&self, sample: ArrayView1<f32>) -> &[f32] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { distribution } => return distribution,
            }
        }
    }
}

/// Forest document as written on disk, before structural checks.
#[derive(Debug, Deserialize)]
struct ForestFile {
    n_features: usize,
    n_classes: usize,
    trees: Vec<Tree>,
}

impl ForestFile {
    /// Structural checks that make traversal panic-free and terminating.
    fn check(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".into());
        }
        if self.n_classes < PixelClass::COUNT {
            return Err(format!(
                "need at least {} classes, found {}",
                PixelClass::COUNT,
                self.n_classes
            ));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(format!("tree {} is empty", t));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Split {
                        feature,
                        left,
                        right,
                        ..
                    } => {
                        if *feature >= self.n_features {
                            return Err(format!(
                                "tree {} node {}: feature {} out of range",
                                t, i, feature
                            ));
                        }
                        for child in [*left, *right] {
                            if child <= i || child >= tree.nodes.len() {
                                return Err(format!(
                                    "tree {} node {}: invalid child {}",
                                    t, i, child
                                ));
                            }
                        }
                    }
                    Node::Leaf { distribution } => {
                        if distribution.len() != self.n_classes {
                            return Err(format!(
                                "tree {} node {}: leaf has {} classes",
                                t,
                                i,
                                distribution.len()
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Averaging decision forest stored as JSON.
///
/// ```json
/// { "n_features": 289, "n_classes": 3,
///   "trees": [ { "nodes": [
///       { "feature": 144, "threshold": -35.0, "left": 1, "right": 2 },
///       { "distribution": [0.1, 0.8, 0.1] },
///       { "distribution": [0.9, 0.05, 0.05] } ] } ] }
/// ```
///
/// Node 0 is the root; a split sends a sample left when its feature is
/// `<= threshold`. Children always come after their parent. The only way
/// to build one is [`ForestClassifier::load`], which checks that structure.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    n_features: usize,
    n_classes: usize,
    trees: Vec<Tree>,
}

impl ForestClassifier {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SegmentationError> {
        let path = path.as_ref();
        tracing::info!("Loading forest classifier from {}", path.display());

        let content =
            fs::read_to_string(path).map_err(|err| SegmentationError::model_load(path, err))?;
        let file: ForestFile =
            serde_json::from_str(&content).map_err(|err| SegmentationError::model_load(path, err))?;
        file.check()
            .map_err(|reason| SegmentationError::model_load(path, reason))?;

        let forest = Self {
            n_features: file.n_features,
            n_classes: file.n_classes,
            trees: file.trees,
        };
        tracing::info!(
            "Forest loaded: {} trees, {} features, {} classes",
            forest.trees.len(),
            forest.n_features,
            forest.n_classes
        );
        Ok(forest)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for ForestClassifier {
    fn predict(&self, features: ArrayView2<f32>, workers: usize) -> Result<Array2<f32>> {
        if features.ncols() != self.n_features {
            bail!(
                "forest expects {} features per sample, got {}",
                self.n_features,
                features.ncols()
            );
        }

        let mut probabilities = Array2::<f32>::zeros((features.nrows(), self.n_classes));
        let weight = 1.0 / self.trees.len() as f32;

        with_workers(workers, || {
            probabilities
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(features.axis_iter(Axis(0)).into_par_iter())
                .for_each(|(mut out, sample)| {
                    for tree in &self.trees {
                        for (acc, p) in out.iter_mut().zip(tree.leaf(sample)) {
                            *acc += p * weight;
                        }
                    }
                });
        });

        Ok(probabilities)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn name(&self) -> &str {
        "forest"
    }
}

/// Feature-blind model: every sample scores the same hand probability.
///
/// Used when no trained model is available; all near-sensor pixels are
/// then treated as hand and the blob and depth stages do the rest.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicClassifier {
    hand_probability: f32,
}

impl HeuristicClassifier {
    pub fn new(hand_probability: f32) -> Self {
        Self {
            hand_probability: hand_probability.clamp(0.0, 1.0),
        }
    }
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Classifier for HeuristicClassifier {
    fn predict(&self, features: ArrayView2<f32>, _workers: usize) -> Result<Array2<f32>> {
        let mut probabilities = Array2::<f32>::zeros((features.nrows(), PixelClass::COUNT));
        probabilities
            .column_mut(PixelClass::Background.index())
            .fill(1.0 - self.hand_probability);
        probabilities
            .column_mut(PixelClass::Hand.index())
            .fill(self.hand_probability);
        Ok(probabilities)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
