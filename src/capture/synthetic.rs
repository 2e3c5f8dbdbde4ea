use super::CaptureSource;
use crate::frame::{ColorFrame, DepthFrame, FramePacket, HandFinderState};
use anyhow::Result;
use image::{Luma, Rgb};

/// Depth sensor stand-in: a flat far wall with a near square sweeping
/// left and right across it.
///
/// A strip of invalid (zero) samples along the left edge mimics the
/// shadow band real structured-light sensors produce.
pub struct SyntheticCapture {
    width: u32,
    height: u32,
    tick: u64,
    wall_depth: u16,
    hand_depth: u16,
    hand_size: u32,
    shadow_cols: u32,
}

impl SyntheticCapture {
    pub fn new(width: u32, height: u32) -> Self {
        tracing::info!("Initializing synthetic depth source at {}x{}", width, height);

        Self {
            width,
            height,
            tick: 0,
            wall_depth: 1800,
            hand_depth: 450,
            hand_size: (height / 4).max(1),
            shadow_cols: width / 40,
        }
    }

    /// Top-left corner of the square on the given tick.
    pub fn hand_origin(&self, tick: u64) -> (u32, u32) {
        let travel = self.width.saturating_sub(self.hand_size + self.shadow_cols).max(1) as u64;
        let phase = tick % (2 * travel);
        let offset = if phase < travel { phase } else { 2 * travel - phase };
        let x = self.shadow_cols + offset as u32;
        let y = (self.height - self.hand_size) / 2;
        (x, y)
    }

    fn render(&self, tick: u64) -> FramePacket {
        let (hx, hy) = self.hand_origin(tick);
        let inside = |x: u32, y: u32| {
            x >= hx && x < hx + self.hand_size && y >= hy && y < hy + self.hand_size
        };

        let depth = DepthFrame::from_fn(self.width, self.height, |x, y| {
            if x < self.shadow_cols {
                Luma([0])
            } else if inside(x, y) {
                Luma([self.hand_depth])
            } else {
                Luma([self.wall_depth])
            }
        });

        let color = ColorFrame::from_fn(self.width, self.height, |x, y| {
            let d = depth.get_pixel(x, y)[0] as u32;
            let shade = 255u32.saturating_sub(d * 255 / 3000) as u8;
            Rgb([shade, shade, shade])
        });

        let sensor_indicator = (hy..hy + self.hand_size)
            .step_by(4)
            .flat_map(|y| (hx..hx + self.hand_size).step_by(4).map(move |x| (x, y)))
            .filter(|&(x, y)| x < self.width && y < self.height)
            .map(|(x, y)| y * self.width + x)
            .collect();

        let hand_finder = HandFinderState {
            sensor_indicator,
            ..Default::default()
        };

        FramePacket::new(tick, depth, color).with_hand_finder(hand_finder)
    }
}

impl CaptureSource for SyntheticCapture {
    fn capture_frame(&mut self) -> Result<FramePacket> {
        let packet = self.render(self.tick);
        self.tick += 1;
        Ok(packet)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_is_near_and_wall_is_far() {
        let mut source = SyntheticCapture::new(160, 120);
        let packet = source.capture_frame().unwrap();
        let (hx, hy) = source.hand_origin(0);

        assert_eq!(packet.depth.get_pixel(hx, hy)[0], 450);
        assert_eq!(packet.depth.get_pixel(0, 0)[0], 0);
        assert_eq!(packet.depth.get_pixel(159, 0)[0], 1800);
        assert!(!packet.hand_finder.sensor_indicator.is_empty());
    }

    #[test]
    fn ticks_advance_and_square_moves() {
        let mut source = SyntheticCapture::new(160, 120);
        let first = source.capture_frame().unwrap();
        let second = source.capture_frame().unwrap();
        assert_eq!((first.id, second.id), (0, 1));
        assert_ne!(source.hand_origin(0), source.hand_origin(10));
    }
}
