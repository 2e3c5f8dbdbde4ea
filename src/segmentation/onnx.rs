use super::classifier::Classifier;
use crate::error::SegmentationError;
use anyhow::{anyhow, Context, Result};
use ndarray::{Array2, ArrayView2, Ix2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;

/// Per-pixel classifier exported to ONNX.
///
/// Expects one `[N, n_features]` float input. Probabilities are read from
/// the output named `probabilities` (the skl2onnx convention, exported
/// with `zipmap=False`), or from the last output otherwise. The output
/// must carry one column per [`PixelClass`](super::PixelClass).
pub struct OnnxClassifier {
    session: Mutex<Session>,
    output_name: String,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self, SegmentationError> {
        let path = model_path.as_ref();
        tracing::info!("Loading ONNX classifier from {}", path.display());

        let session =
            Self::build_session(path).map_err(|err| SegmentationError::model_load(path, format!("{:#}", err)))?;

        let output_name = session
            .outputs
            .iter()
            .find(|output| output.name == "probabilities")
            .or_else(|| session.outputs.last())
            .map(|output| output.name.clone())
            .ok_or_else(|| SegmentationError::model_load(path, "model has no outputs"))?;

        tracing::info!("ONNX classifier loaded, reading output '{}'", output_name);

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }

    fn build_session(path: &Path) -> Result<Session> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;
        Ok(session)
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, features: ArrayView2<f32>, _workers: usize) -> Result<Array2<f32>> {
        let _infer_span = tracing::debug_span!("inference").entered();

        let contiguous = features.as_standard_layout();
        let input = TensorRef::from_array_view(contiguous.view())?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("ONNX session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![input])
            .context("Failed to run inference")?;

        let probabilities = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix2>()?
            .to_owned();

        Ok(probabilities)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
