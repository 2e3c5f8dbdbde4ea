mod blob;
mod classifier;
mod features;
#[cfg(feature = "onnx")]
mod onnx;
mod postprocess;
mod preprocess;
mod probability;
pub mod types;

pub use blob::{connected_components, largest_blob, largest_component, BlobSelector, Component};
pub use classifier::{load_classifier, Classifier, ForestClassifier, HeuristicClassifier};
pub use features::{Candidate, FeatureExtractor};
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;
pub use postprocess::{dilate, HandPostprocessor, PostprocessOutput};
pub use preprocess::{CleanDepth, DepthPreprocessor};
pub use probability::ProbabilityMaps;
pub use types::{DepthBand, Mask, PixelClass, ProbabilityMap, SegmentationReport};

use crate::config::SegmentationConfig;
use crate::error::SegmentationError;
use crate::frame::{ColorFrame, DepthFrame, Silhouette};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Depth frame to hand silhouette.
///
/// Holds no per-frame state: every call allocates its own feature matrix,
/// probability maps and masks. The classifier is shared read-only.
pub struct HandSegmenter {
    config: SegmentationConfig,
    classifier: Arc<dyn Classifier>,
    preprocessor: DepthPreprocessor,
    extractor: FeatureExtractor,
    hand_blobs: BlobSelector,
    postprocessor: HandPostprocessor,
}

impl HandSegmenter {
    pub fn new(config: SegmentationConfig, classifier: Arc<dyn Classifier>) -> Result<Self> {
        config.validate().context("Invalid segmentation config")?;

        tracing::info!(
            "Hand segmenter ready: {}x{} camera, {}x downsample, {} classifier, {} workers",
            config.width,
            config.height,
            config.downsample_factor,
            classifier.name(),
            config.workers
        );

        Ok(Self {
            preprocessor: DepthPreprocessor::from_config(&config),
            extractor: FeatureExtractor::from_config(&config),
            hand_blobs: BlobSelector::new(config.hand_threshold),
            postprocessor: HandPostprocessor::from_config(&config),
            classifier,
            config,
        })
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Segment one depth/color pair into a camera-resolution silhouette.
    ///
    /// Only a resolution mismatch is an error. A frame with nothing near
    /// the sensor, or a classifier failure, yields an all-zero silhouette.
    pub fn segment(
        &self,
        depth: &DepthFrame,
        color: &ColorFrame,
    ) -> Result<Silhouette, SegmentationError> {
        self.segment_detailed(depth, color)
            .map(|report| report.silhouette)
    }

    /// [`segment`](Self::segment) plus the intermediate results.
    pub fn segment_detailed(
        &self,
        depth: &DepthFrame,
        color: &ColorFrame,
    ) -> Result<SegmentationReport, SegmentationError> {
        let _span = tracing::debug_span!("segment").entered();

        let expected = (self.config.width, self.config.height);
        for actual in [depth.dimensions(), color.dimensions()] {
            if actual != expected {
                return Err(SegmentationError::InvalidFrame { expected, actual });
            }
        }

        let clean = self.preprocessor.preprocess(depth);
        let (grid_w, grid_h) = clean.downsampled.dimensions();

        let candidates = self.extractor.candidates(&clean.downsampled);
        let maps = if candidates.is_empty() {
            tracing::debug!("No pixels closer than {} mm", self.config.near_plane);
            ProbabilityMaps::empty(grid_w, grid_h)
        } else {
            self.classify(&clean, &candidates)
        };

        let hand_blob = self.hand_blobs.select(&maps.hand);
        let out = self.postprocessor.run(&clean.full, &hand_blob, &maps);

        Ok(SegmentationReport {
            silhouette: out.silhouette,
            labelled: out.labelled,
            hand_blob,
            hand_depth: out.hand_depth,
            band: out.band,
            candidates: candidates.len(),
        })
    }

    fn classify(&self, clean: &CleanDepth, candidates: &[Candidate]) -> ProbabilityMaps {
        let (grid_w, grid_h) = clean.downsampled.dimensions();
        let workers = self.config.workers;
        let n_classes = self.classifier.n_classes();

        let features = self
            .extractor
            .extract(&clean.downsampled, candidates, workers);

        let _span = tracing::debug_span!("classify").entered();
        match self.classifier.predict(features.view(), workers) {
            Ok(probabilities)
                if probabilities.nrows() == candidates.len()
                    && probabilities.ncols() == n_classes
                    && n_classes >= PixelClass::COUNT =>
            {
                ProbabilityMaps::scatter(probabilities.view(), candidates, grid_w, grid_h)
            }
            Ok(probabilities) => {
                tracing::warn!(
                    "Classifier returned {:?} for {} samples, skipping frame",
                    probabilities.dim(),
                    candidates.len()
                );
                ProbabilityMaps::empty(grid_w, grid_h)
            }
            Err(err) => {
                tracing::warn!("Classifier failed, skipping frame: {:#}", err);
                ProbabilityMaps::empty(grid_w, grid_h)
            }
        }
    }
}
