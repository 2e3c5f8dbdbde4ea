use crate::config::SegmentationConfig;
use crate::frame::DepthFrame;
use image::Luma;

/// Depth grids ready for feature extraction.
#[derive(Debug, Clone)]
pub struct CleanDepth {
    /// Median-filtered, camera resolution
    pub full: DepthFrame,
    /// Nearest-neighbour downsample of `full`
    pub downsampled: DepthFrame,
}

/// Denoises and downsamples raw depth, replacing invalid samples with the
/// background depth.
pub struct DepthPreprocessor {
    kernel: u32,
    factor: u32,
    background_depth: u16,
}

impl DepthPreprocessor {
    pub fn new(kernel: u32, factor: u32, background_depth: u16) -> Self {
        Self {
            kernel: kernel.max(1),
            factor: factor.max(1),
            background_depth,
        }
    }

    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::new(
            config.median_kernel,
            config.downsample_factor,
            config.background_depth,
        )
    }

    /// Steps:
    /// 1. Median filter to drop shot noise
    /// 2. Nearest-neighbour downsample by the configured factor
    /// 3. Replace zeros with the background depth in both grids
    pub fn preprocess(&self, depth: &DepthFrame) -> CleanDepth {
        let _span = tracing::debug_span!("preprocess").entered();

        let mut full = median_filter(depth, self.kernel / 2);
        let mut downsampled = downsample_nearest(&full, self.factor);

        fill_invalid(&mut full, self.background_depth);
        fill_invalid(&mut downsampled, self.background_depth);

        CleanDepth { full, downsampled }
    }
}

/// Square median filter with edge replication. A radius of 0 copies.
pub fn median_filter(depth: &DepthFrame, radius: u32) -> DepthFrame {
    if radius == 0 {
        return depth.clone();
    }

    let (width, height) = depth.dimensions();
    let r = radius as i64;
    let side = (2 * radius + 1) as usize;
    let mut window = Vec::with_capacity(side * side);

    DepthFrame::from_fn(width, height, |x, y| {
        window.clear();
        for dy in -r..=r {
            let sy = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
            for dx in -r..=r {
                let sx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
                window.push(depth.get_pixel(sx, sy)[0]);
            }
        }
        let mid = window.len() / 2;
        let (_, median, _) = window.select_nth_unstable(mid);
        Luma([*median])
    })
}

/// Keep every `factor`-th sample in each direction, starting at the origin.
pub fn downsample_nearest(depth: &DepthFrame, factor: u32) -> DepthFrame {
    let factor = factor.max(1);
    let (width, height) = depth.dimensions();
    DepthFrame::from_fn(width / factor, height / factor, |x, y| {
        *depth.get_pixel(x * factor, y * factor)
    })
}

/// Replace "no return" samples so they never read as near.
pub fn fill_invalid(depth: &mut DepthFrame, background_depth: u16) {
    for pixel in depth.pixels_mut() {
        if pixel[0] == 0 {
            pixel[0] = background_depth;
        }
    }
}
