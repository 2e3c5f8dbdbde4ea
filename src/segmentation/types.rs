use crate::frame::Silhouette;
use image::{GrayImage, ImageBuffer, Luma};

/// Per-pixel class probability in [0, 1]. Pixels never sampled hold 0.
pub type ProbabilityMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// 8-bit mask; any non-zero value is foreground.
pub type Mask = GrayImage;

/// Foreground value written into masks and silhouettes
pub const MASK_ON: u8 = 255;

/// Marks dilated hand pixels that also score as wrist
pub const WRIST_MARKER: u8 = 120;

/// Output columns of the per-pixel classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    Background = 0,
    Hand = 1,
    Wrist = 2,
}

impl PixelClass {
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Inclusive range of depths accepted as belonging to the hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthBand {
    pub min: u16,
    pub max: u16,
}

impl DepthBand {
    pub fn around(estimate: u16, margin: u16) -> Self {
        Self {
            min: estimate.saturating_sub(margin),
            max: estimate.saturating_add(margin),
        }
    }

    pub fn contains(&self, depth: u16) -> bool {
        (self.min..=self.max).contains(&depth)
    }
}

/// Everything one pipeline run produced, for callers that want more than
/// the silhouette.
#[derive(Debug, Clone)]
pub struct SegmentationReport {
    /// Final hand mask at camera resolution
    pub silhouette: Silhouette,
    /// Dilated hand mask before the depth cut; wrist pixels carry
    /// [`WRIST_MARKER`]
    pub labelled: Mask,
    /// Largest hand blob at feature resolution
    pub hand_blob: Mask,
    /// Mean depth under `hand_blob`, or the background depth if it is empty
    pub hand_depth: u16,
    pub band: DepthBand,
    /// Number of near-sensor pixels that were classified
    pub candidates: usize,
}

impl SegmentationReport {
    /// True when no pixel survived the pipeline
    pub fn is_empty(&self) -> bool {
        self.silhouette.pixels().all(|p| p[0] == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_is_inclusive() {
        let band = DepthBand::around(1000, 100);
        assert_eq!((band.min, band.max), (900, 1100));
        assert!(band.contains(900));
        assert!(band.contains(1100));
        assert!(!band.contains(1101));
        assert!(!band.contains(899));
    }

    #[test]
    fn band_saturates_at_limits() {
        let band = DepthBand::around(50, 100);
        assert_eq!(band.min, 0);
        let band = DepthBand::around(u16::MAX - 10, 100);
        assert_eq!(band.max, u16::MAX);
    }
}
