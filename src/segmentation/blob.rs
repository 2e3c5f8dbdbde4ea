use super::types::{Mask, ProbabilityMap, MASK_ON};
use image::Luma;
use std::collections::VecDeque;

/// 8-neighbour offsets, counter-clockwise on screen starting east.
const NEIGHBOURS: [(i64, i64); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];
const WEST: usize = 4;

/// One 8-connected foreground region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub pixels: Vec<(u32, u32)>,
    /// Outer border, pixel centres in counter-clockwise order.
    pub contour: Vec<(u32, u32)>,
}

impl Component {
    /// Area enclosed by the outer contour.
    ///
    /// Lines and single pixels enclose nothing, so a 1x30 stroke has area 0
    /// while a 5x5 square has area 16.
    pub fn area(&self) -> f64 {
        polygon_area(&self.contour)
    }
}

/// Shoelace area of a closed polygon.
fn polygon_area(points: &[(u32, u32)]) -> f64 {
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(&(x0, y0), &(x1, y1))| x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64)
        .sum();
    twice.unsigned_abs() as f64 / 2.0
}

/// Follow the outer border of the region whose raster-first pixel is `start`.
///
/// Suzuki-Abe border following: the first neighbour is found clockwise from
/// the west, every later step searches counter-clockwise from just past the
/// pixel we came from. Stops when the walk steps back onto `start` from the
/// neighbour that the clockwise search found first.
fn trace_outer_border(mask: &Mask, start: (u32, u32)) -> Vec<(u32, u32)> {
    let (width, height) = mask.dimensions();
    let step = |(x, y): (u32, u32), dir: usize| -> Option<(u32, u32)> {
        let (dx, dy) = NEIGHBOURS[dir];
        let (nx, ny) = (x as i64 + dx, y as i64 + dy);
        if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
            return None;
        }
        let (nx, ny) = (nx as u32, ny as u32);
        (mask.get_pixel(nx, ny)[0] != 0).then_some((nx, ny))
    };

    let first = (0..8)
        .map(|i| (WEST + 8 - i) % 8)
        .find_map(|dir| step(start, dir).map(|p| (p, dir)));
    let Some((second, first_dir)) = first else {
        return vec![start];
    };

    let mut contour = Vec::new();
    let mut current = start;
    let mut back = first_dir;
    loop {
        let next = (1..=8)
            .map(|i| (back + i) % 8)
            .find_map(|dir| step(current, dir).map(|p| (p, dir)));
        let Some((next, dir)) = next else {
            break;
        };
        contour.push(current);
        if next == start && current == second {
            break;
        }
        back = (dir + 4) % 8;
        current = next;
    }
    contour
}

/// `MASK_ON` where `p > threshold`, 0 elsewhere.
pub fn threshold(map: &ProbabilityMap, threshold: f32) -> Mask {
    Mask::from_fn(map.width(), map.height(), |x, y| {
        if map.get_pixel(x, y)[0] > threshold {
            Luma([MASK_ON])
        } else {
            Luma([0])
        }
    })
}

/// 8-connected regions of non-zero pixels, in the raster order of each
/// region's first pixel.
pub fn connected_components(mask: &Mask) -> Vec<Component> {
    let (width, height) = mask.dimensions();
    let mut visited = vec![false; (width as usize) * (height as usize)];
    let index = |x: u32, y: u32| (y as usize) * (width as usize) + x as usize;

    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for (sx, sy, seed) in mask.enumerate_pixels() {
        if seed[0] == 0 || visited[index(sx, sy)] {
            continue;
        }

        visited[index(sx, sy)] = true;
        queue.push_back((sx, sy));
        let mut pixels = Vec::new();

        while let Some((x, y)) = queue.pop_front() {
            pixels.push((x, y));
            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    let i = index(nx, ny);
                    if !visited[i] && mask.get_pixel(nx, ny)[0] != 0 {
                        visited[i] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }
        }

        let contour = trace_outer_border(mask, (sx, sy));
        components.push(Component { pixels, contour });
    }

    components
}

/// Component with the largest contour area.
///
/// Only a strictly larger area replaces the current pick, so among equal
/// areas the first one discovered wins.
pub fn largest_component(mask: &Mask) -> Option<Component> {
    let mut best: Option<Component> = None;
    for component in connected_components(mask) {
        if best.as_ref().map_or(true, |b| component.area() > b.area()) {
            best = Some(component);
        }
    }
    best
}

/// Mask holding only the largest component, filled with `MASK_ON`.
/// Holes inside the component stay empty.
pub fn largest_blob(mask: &Mask) -> Mask {
    let mut blob = Mask::new(mask.width(), mask.height());
    if let Some(component) = largest_component(mask) {
        for (x, y) in component.pixels {
            blob.put_pixel(x, y, Luma([MASK_ON]));
        }
    }
    blob
}

/// Thresholds a probability map and keeps its largest blob.
#[derive(Debug, Clone, Copy)]
pub struct BlobSelector {
    threshold: f32,
}

impl BlobSelector {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn select(&self, map: &ProbabilityMap) -> Mask {
        let _span = tracing::debug_span!("blob").entered();
        largest_blob(&threshold(map, self.threshold))
    }
}
