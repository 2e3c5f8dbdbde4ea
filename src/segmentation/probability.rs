use super::features::Candidate;
use super::types::{PixelClass, ProbabilityMap};
use image::Luma;
use ndarray::ArrayView2;

/// Hand and wrist probabilities on the feature grid.
#[derive(Debug, Clone)]
pub struct ProbabilityMaps {
    pub hand: ProbabilityMap,
    pub wrist: ProbabilityMap,
}

impl ProbabilityMaps {
    /// Scatter classifier rows back onto a `width x height` grid.
    ///
    /// Row `i` of `probabilities` lands on `candidates[i]`; every other
    /// pixel keeps probability 0.
    pub fn scatter(
        probabilities: ArrayView2<f32>,
        candidates: &[Candidate],
        width: u32,
        height: u32,
    ) -> Self {
        let _span = tracing::debug_span!("probability_maps").entered();

        Self {
            hand: scatter_class(probabilities, candidates, PixelClass::Hand, width, height),
            wrist: scatter_class(probabilities, candidates, PixelClass::Wrist, width, height),
        }
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            hand: ProbabilityMap::new(width, height),
            wrist: ProbabilityMap::new(width, height),
        }
    }
}

fn scatter_class(
    probabilities: ArrayView2<f32>,
    candidates: &[Candidate],
    class: PixelClass,
    width: u32,
    height: u32,
) -> ProbabilityMap {
    let mut map = ProbabilityMap::new(width, height);
    for (i, &(x, y)) in candidates.iter().enumerate() {
        if x >= width || y >= height {
            continue;
        }
        if let Some(&p) = probabilities.get([i, class.index()]) {
            map.put_pixel(x, y, Luma([p.clamp(0.0, 1.0)]));
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rows_land_on_their_candidates() {
        let probabilities = array![[0.1, 0.8, 0.1], [0.2, 0.3, 0.5]];
        let candidates = [(2, 1), (0, 3)];

        let maps = ProbabilityMaps::scatter(probabilities.view(), &candidates, 4, 4);
        assert_eq!(maps.hand.get_pixel(2, 1)[0], 0.8);
        assert_eq!(maps.wrist.get_pixel(2, 1)[0], 0.1);
        assert_eq!(maps.hand.get_pixel(0, 3)[0], 0.3);
        assert_eq!(maps.wrist.get_pixel(0, 3)[0], 0.5);
    }

    #[test]
    fn unsampled_pixels_stay_zero() {
        let probabilities = array![[0.0, 1.0, 1.0]];
        let maps = ProbabilityMaps::scatter(probabilities.view(), &[(1, 1)], 3, 3);

        let hot: usize = maps.hand.pixels().filter(|p| p[0] > 0.0).count();
        assert_eq!(hot, 1);
        assert_eq!(maps.hand.get_pixel(0, 0)[0], 0.0);
        assert_eq!(maps.wrist.get_pixel(2, 2)[0], 0.0);
    }
}
