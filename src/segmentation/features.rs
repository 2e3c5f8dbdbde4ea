use crate::config::SegmentationConfig;
use crate::frame::DepthFrame;
use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayViewMut1, Axis};

/// Pixel coordinate (x, y) on the downsampled grid
pub type Candidate = (u32, u32);

/// Depth-invariant radial features for near-sensor pixels.
///
/// Each candidate at depth `d` samples a (2R+1)x(2R+1) lattice of
/// neighbours whose spacing shrinks with `reach / d`, so a hand covers
/// roughly the same lattice whether it is close to or far from the sensor.
/// A feature value is the neighbour's depth minus `d`.
pub struct FeatureExtractor {
    radius: u32,
    reach: f32,
    near_plane: u16,
    background_depth: u16,
}

impl FeatureExtractor {
    pub fn new(radius: u32, reach: f32, near_plane: u16, background_depth: u16) -> Self {
        Self {
            radius: radius.max(1),
            reach,
            near_plane,
            background_depth,
        }
    }

    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::new(
            config.feature_radius,
            config.feature_reach,
            config.near_plane,
            config.background_depth,
        )
    }

    pub fn feature_len(&self) -> usize {
        let side = 2 * self.radius as usize + 1;
        side * side
    }

    /// Pixels strictly closer than the near plane, in row-major order.
    pub fn candidates(&self, depth: &DepthFrame) -> Vec<Candidate> {
        depth
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] < self.near_plane)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    /// Build the `candidates.len() x feature_len()` feature matrix.
    ///
    /// Rows are filled in parallel on a pool of `workers` threads that is
    /// joined before returning. Row `i` always belongs to `candidates[i]`,
    /// whatever the worker count.
    pub fn extract(&self, depth: &DepthFrame, candidates: &[Candidate], workers: usize) -> Array2<f32> {
        let _span = tracing::debug_span!("features", samples = candidates.len()).entered();

        let mut features = Array2::<f32>::zeros((candidates.len(), self.feature_len()));
        if candidates.is_empty() {
            return features;
        }

        with_workers(workers, || {
            features
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(candidates.par_iter())
                .for_each(|(row, &candidate)| self.fill_row(depth, candidate, row));
        });

        features
    }

    fn fill_row(&self, depth: &DepthFrame, (x, y): Candidate, mut row: ArrayViewMut1<f32>) {
        let (width, height) = depth.dimensions();
        let d = depth.get_pixel(x, y)[0].max(1) as f32;
        let scale = self.reach / d;
        let r = self.radius as i64;
        let fallback = self.background_depth as f32 - d;

        let mut slot = 0;
        for k in -r..=r {
            let nx = x as i64 + offset(scale, k, r);
            for l in -r..=r {
                let ny = y as i64 + offset(scale, l, r);
                row[slot] = if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    fallback
                } else {
                    depth.get_pixel(nx as u32, ny as u32)[0] as f32 - d
                };
                slot += 1;
            }
        }
    }
}

/// `round(scale * step / radius)`, kept in floating point so small steps
/// do not truncate to zero.
fn offset(scale: f32, step: i64, radius: i64) -> i64 {
    (scale * step as f32 / radius as f32).round() as i64
}

/// Run `op` on a dedicated pool of `workers` threads.
///
/// Falls back to the global rayon pool if the dedicated one cannot be
/// built.
pub(crate) fn with_workers<R, F>(workers: usize, op: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
    {
        Ok(pool) => pool.install(op),
        Err(err) => {
            tracing::warn!("Falling back to global worker pool: {}", err);
            op()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(8, 12000.0, 600, 3000)
    }

    /// Index of lattice position (k, l), both in [-R, R]
    fn slot(k: i64, l: i64) -> usize {
        ((k + 8) * 17 + (l + 8)) as usize
    }

    fn scene() -> DepthFrame {
        DepthFrame::from_fn(80, 60, |x, y| {
            let in_hand = (30..50).contains(&x) && (20..40).contains(&y);
            let in_arm = (36..44).contains(&x) && y >= 40;
            if in_hand {
                Luma([480 + ((x + y) % 7) as u16])
            } else if in_arm {
                Luma([560])
            } else {
                Luma([3000])
            }
        })
    }

    #[test]
    fn only_near_pixels_are_candidates() {
        let depth = scene();
        let candidates = extractor().candidates(&depth);
        assert_eq!(candidates.len(), 20 * 20 + 8 * 20);
        assert!(candidates.iter().all(|&(x, y)| depth.get_pixel(x, y)[0] < 600));
        assert!(candidates.windows(2).all(|w| (w[0].1, w[0].0) < (w[1].1, w[1].0)));
    }

    #[test]
    fn near_plane_is_strict() {
        let depth = DepthFrame::from_pixel(4, 4, Luma([600]));
        assert!(extractor().candidates(&depth).is_empty());
    }

    #[test]
    fn empty_candidates_give_empty_matrix() {
        let features = extractor().extract(&scene(), &[], 4);
        assert_eq!(features.dim(), (0, 289));
    }

    #[test]
    fn offsets_scale_with_depth() {
        // reach / d = 24 at 500 mm, so one lattice step is 3 pixels
        let mut depth = DepthFrame::from_pixel(80, 60, Luma([3000]));
        depth.put_pixel(40, 30, Luma([500]));
        depth.put_pixel(43, 30, Luma([700]));
        depth.put_pixel(40, 27, Luma([650]));

        let features = extractor().extract(&depth, &[(40, 30)], 1);
        let row = features.row(0);
        assert_eq!(row[slot(0, 0)], 0.0);
        assert_eq!(row[slot(1, 0)], 200.0);
        assert_eq!(row[slot(0, -1)], 150.0);
        assert_eq!(row[slot(8, 8)], 2500.0);
    }

    #[test]
    fn out_of_bounds_uses_background_fallback() {
        let mut depth = DepthFrame::from_pixel(80, 60, Luma([2000]));
        depth.put_pixel(0, 0, Luma([400]));

        let features = extractor().extract(&depth, &[(0, 0)], 1);
        let row = features.row(0);
        assert_eq!(row[slot(-8, 0)], 2600.0);
        assert_eq!(row[slot(0, -3)], 2600.0);
        assert_eq!(row[slot(2, 2)], 1600.0);
    }

    #[test]
    fn worker_count_does_not_change_features() {
        let extractor = extractor();
        let depth = scene();
        let candidates = extractor.candidates(&depth);

        let serial = extractor.extract(&depth, &candidates, 1);
        let parallel = extractor.extract(&depth, &candidates, 16);
        assert_eq!(serial, parallel);
    }
}
