use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Tunable parameters of the hand segmentation pipeline.
///
/// Every field has a default, so a config file only needs to list the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Camera resolution every depth/color pair must match
    pub width: u32,
    pub height: u32,

    /// Median filter aperture (odd)
    pub median_kernel: u32,
    /// Integer downsample factor for the feature stage
    pub downsample_factor: u32,

    /// Depth (mm) substituted for invalid samples
    pub background_depth: u16,
    /// Pixels strictly closer than this (mm) become candidates
    pub near_plane: u16,

    /// Half-width R of the sampled neighbourhood
    pub feature_radius: u32,
    /// Pixel reach at 1 mm, divided by the candidate depth
    pub feature_reach: f32,

    pub hand_threshold: f32,
    pub wrist_threshold: f32,
    /// Half-size of the square structuring element
    pub dilation_radius: u32,
    /// Accepted distance (mm) from the estimated hand depth
    pub depth_margin: u16,

    /// Fork-join width for feature extraction and prediction
    pub workers: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            median_kernel: 3,
            downsample_factor: 8,
            background_depth: 3000,
            near_plane: 600,
            feature_radius: 8,
            feature_reach: 12000.0,
            hand_threshold: 0.7,
            wrist_threshold: 0.6,
            dilation_radius: 9,
            depth_margin: 100,
            workers: 16,
        }
    }
}

impl SegmentationConfig {
    /// Load a JSON config, falling back to defaults for missing fields.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;

        tracing::info!("Loaded segmentation config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.downsample_factor == 0 {
            bail!("downsample_factor must be at least 1");
        }
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.feature_radius == 0 {
            bail!("feature_radius must be at least 1");
        }
        if self.near_plane >= self.background_depth {
            bail!(
                "near_plane ({} mm) must be closer than background_depth ({} mm)",
                self.near_plane,
                self.background_depth
            );
        }
        if self.median_kernel % 2 == 0 {
            bail!("median_kernel must be odd, got {}", self.median_kernel);
        }
        for (name, value) in [
            ("hand_threshold", self.hand_threshold),
            ("wrist_threshold", self.wrist_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be within [0, 1], got {}", name, value);
            }
        }
        let (w, h) = self.downsampled_size();
        if w == 0 || h == 0 {
            bail!(
                "{}x{} camera leaves an empty grid at downsample factor {}",
                self.width,
                self.height,
                self.downsample_factor
            );
        }
        Ok(())
    }

    /// Resolution of the feature-stage depth grid
    pub fn downsampled_size(&self) -> (u32, u32) {
        let factor = self.downsample_factor.max(1);
        (self.width / factor, self.height / factor)
    }

    /// Length of one feature vector, (2R+1)^2
    pub fn feature_len(&self) -> usize {
        let side = 2 * self.feature_radius as usize + 1;
        side * side
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_sensor_constants() {
        let config = SegmentationConfig::default();
        assert_eq!(config.downsampled_size(), (80, 60));
        assert_eq!(config.feature_len(), 289);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "near_plane": 750, "workers": 4 }}"#).unwrap();

        let config = SegmentationConfig::from_file(file.path()).unwrap();
        assert_eq!(config.near_plane, 750);
        assert_eq!(config.workers, 4);
        assert_eq!(config.background_depth, 3000);
    }

    #[test]
    fn rejects_degenerate_values() {
        let config = SegmentationConfig {
            downsample_factor: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SegmentationConfig {
            hand_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SegmentationConfig {
            width: 4,
            height: 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // Filled-in invalid pixels would sit in front of the near plane
        for near_plane in [3000, 3500] {
            let config = SegmentationConfig {
                near_plane,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "accepted near_plane {}", near_plane);
        }
    }
}
