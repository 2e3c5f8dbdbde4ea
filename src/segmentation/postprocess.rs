use super::blob::{largest_component, threshold};
use super::probability::ProbabilityMaps;
use super::types::{DepthBand, Mask, ProbabilityMap, MASK_ON, WRIST_MARKER};
use crate::config::SegmentationConfig;
use crate::frame::{DepthFrame, Silhouette};
use image::{imageops, Luma};

/// Result of the full-resolution stage.
#[derive(Debug, Clone)]
pub struct PostprocessOutput {
    pub silhouette: Silhouette,
    pub labelled: Mask,
    pub hand_depth: u16,
    pub band: DepthBand,
}

/// Lifts the low-resolution hand blob to camera resolution and cuts away
/// everything outside the hand's depth band.
pub struct HandPostprocessor {
    hand_threshold: f32,
    wrist_threshold: f32,
    dilation_radius: u32,
    depth_margin: u16,
    background_depth: u16,
}

impl HandPostprocessor {
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            hand_threshold: config.hand_threshold,
            wrist_threshold: config.wrist_threshold,
            dilation_radius: config.dilation_radius,
            depth_margin: config.depth_margin,
            background_depth: config.background_depth,
        }
    }

    /// Mean full-resolution depth under the (upsampled) hand blob.
    /// An empty blob yields the background depth.
    pub fn estimate_hand_depth(&self, full_depth: &DepthFrame, hand_blob: &Mask) -> u16 {
        let (width, height) = full_depth.dimensions();
        let mask = resize_nearest(hand_blob, width, height);

        let (sum, count) = full_depth
            .pixels()
            .zip(mask.pixels())
            .filter(|(_, m)| m[0] != 0)
            .fold((0u64, 0u64), |(sum, count), (d, _)| (sum + d[0] as u64, count + 1));

        if count == 0 {
            self.background_depth
        } else {
            (sum / count) as u16
        }
    }

    /// Steps:
    /// 1. Estimate the hand depth and the accepted band around it
    /// 2. Upsample both probability maps and threshold them
    /// 3. Dilate the hand mask, marking dilated pixels that score as wrist
    /// 4. Keep the largest component of the dilated mask
    /// 5. Zero every pixel whose depth falls outside the band
    pub fn run(
        &self,
        full_depth: &DepthFrame,
        hand_blob: &Mask,
        maps: &ProbabilityMaps,
    ) -> PostprocessOutput {
        let _span = tracing::debug_span!("postprocess").entered();
        let (width, height) = full_depth.dimensions();

        let hand_depth = self.estimate_hand_depth(full_depth, hand_blob);
        let band = DepthBand::around(hand_depth, self.depth_margin);

        let hand = threshold(&upsample(&maps.hand, width, height), self.hand_threshold);
        let wrist = threshold(&upsample(&maps.wrist, width, height), self.wrist_threshold);

        let mut labelled = dilate(&hand, self.dilation_radius);
        for (l, w) in labelled.pixels_mut().zip(wrist.pixels()) {
            if l[0] != 0 && w[0] != 0 {
                l[0] = WRIST_MARKER;
            }
        }

        let mut silhouette = Silhouette::new(width, height);
        if let Some(component) = largest_component(&labelled) {
            for (x, y) in component.pixels {
                if band.contains(full_depth.get_pixel(x, y)[0]) {
                    silhouette.put_pixel(x, y, Luma([MASK_ON]));
                }
            }
        }

        for (l, s) in labelled.pixels_mut().zip(silhouette.pixels()) {
            if s[0] == 0 {
                l[0] = 0;
            }
        }

        tracing::debug!(
            "hand depth {} mm, band [{}, {}]",
            hand_depth,
            band.min,
            band.max
        );

        PostprocessOutput {
            silhouette,
            labelled,
            hand_depth,
            band,
        }
    }
}

/// Bilinear resize of a probability map.
pub fn upsample(map: &ProbabilityMap, width: u32, height: u32) -> ProbabilityMap {
    imageops::resize(map, width, height, imageops::FilterType::Triangle)
}

/// Nearest-neighbour resize; source pixel is `floor(x * src / dst)`.
pub fn resize_nearest(mask: &Mask, width: u32, height: u32) -> Mask {
    let (src_w, src_h) = mask.dimensions();
    if (src_w, src_h) == (width, height) {
        return mask.clone();
    }
    if src_w == 0 || src_h == 0 {
        return Mask::new(width, height);
    }
    Mask::from_fn(width, height, |x, y| {
        let sx = (x as u64 * src_w as u64 / width as u64) as u32;
        let sy = (y as u64 * src_h as u64 / height as u64) as u32;
        *mask.get_pixel(sx, sy)
    })
}

/// Dilation by a `(2r+1) x (2r+1)` square, as a row pass then a column
/// pass. Output pixels are `MASK_ON` or 0.
pub fn dilate(mask: &Mask, radius: u32) -> Mask {
    let (width, height) = mask.dimensions();
    let on = |v: u8| if v != 0 { MASK_ON } else { 0 };
    if radius == 0 {
        return Mask::from_fn(width, height, |x, y| Luma([on(mask.get_pixel(x, y)[0])]));
    }

    let rows = Mask::from_fn(width, height, |x, y| {
        let lo = x.saturating_sub(radius);
        let hi = x.saturating_add(radius).min(width - 1);
        Luma([on((lo..=hi).map(|sx| mask.get_pixel(sx, y)[0]).max().unwrap_or(0))])
    });

    Mask::from_fn(width, height, |x, y| {
        let lo = y.saturating_sub(radius);
        let hi = y.saturating_add(radius).min(height - 1);
        Luma([(lo..=hi).map(|sy| rows.get_pixel(x, sy)[0]).max().unwrap_or(0)])
    })
}
