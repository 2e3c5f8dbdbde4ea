use image::{GrayImage, ImageBuffer, Luma, RgbImage};

/// Depth in millimetres; 0 means the sensor got no return.
pub type DepthFrame = ImageBuffer<Luma<u16>, Vec<u16>>;

/// RGB image registered 1:1 with a [`DepthFrame`].
pub type ColorFrame = RgbImage;

/// Binary hand mask at camera resolution: 255 = hand, 0 = everything else.
pub type Silhouette = GrayImage;

/// Hand-finder results carried alongside a frame through the channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandFinderState {
    pub wristband_found: bool,
    pub wristband_center: Option<[f32; 3]>,
    pub wristband_direction: Option<[f32; 3]>,
    /// Linear pixel indices flagged by the sensor-side hand finder
    pub sensor_indicator: Vec<u32>,
    /// Silhouette computed for the previous capture, if any
    pub previous_silhouette: Option<Silhouette>,
}

/// Everything captured on one sensor tick.
#[derive(Debug, Clone)]
pub struct FramePacket {
    /// Monotonic capture tick
    pub id: u64,
    pub depth: DepthFrame,
    pub color: ColorFrame,
    pub hand_finder: HandFinderState,
}

impl FramePacket {
    pub fn new(id: u64, depth: DepthFrame, color: ColorFrame) -> Self {
        Self {
            id,
            depth,
            color,
            hand_finder: HandFinderState::default(),
        }
    }

    pub fn with_hand_finder(mut self, hand_finder: HandFinderState) -> Self {
        self.hand_finder = hand_finder;
        self
    }
}
