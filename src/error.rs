use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the segmentation core and its frame hand-off.
///
/// Empty detections (no near pixels, no components, nothing to average)
/// are not represented here: they produce an empty silhouette.
#[derive(Debug, Error)]
pub enum SegmentationError {
    /// Classifier file missing or malformed. Fatal at startup.
    #[error("failed to load classifier from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// Frame does not match the configured camera resolution.
    #[error("frame is {actual:?}, expected {expected:?}")]
    InvalidFrame {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// No frame arrived within the caller's wait budget.
    #[error("no frame produced within {waited:?}")]
    ChannelStall { waited: Duration },
}

impl SegmentationError {
    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
