mod channel;
mod synthetic;

pub use channel::FrameChannel;
pub use synthetic::SyntheticCapture;

use crate::frame::FramePacket;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Trait for depth camera sources
pub trait CaptureSource {
    /// Capture a single depth/color pair with its hand-finder state
    fn capture_frame(&mut self) -> Result<FramePacket>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}

/// Run `source` on its own thread, publishing every frame into `channel`.
///
/// Stops after `frames` captures when a budget is given. `fps` of 0
/// disables rate limiting; the channel's backpressure still applies.
/// The thread yields the number of frames produced.
pub fn spawn_acquisition<C>(
    mut source: C,
    channel: Arc<FrameChannel>,
    frames: Option<u64>,
    fps: u32,
) -> Result<JoinHandle<Result<u64>>>
where
    C: CaptureSource + Send + 'static,
{
    let frame_duration = (fps > 0).then(|| Duration::from_secs_f32(1.0 / fps as f32));

    thread::Builder::new()
        .name("acquisition".into())
        .spawn(move || -> Result<u64> {
            let (width, height) = source.resolution();
            tracing::info!("Acquisition started at {}x{}", width, height);

            let mut produced = 0u64;
            while frames.map_or(true, |limit| produced < limit) {
                let loop_start = Instant::now();

                let packet = source
                    .capture_frame()
                    .context("Failed to capture frame")?;
                channel.produce(packet);
                produced += 1;

                if let Some(frame_duration) = frame_duration {
                    let elapsed = loop_start.elapsed();
                    if elapsed < frame_duration {
                        thread::sleep(frame_duration - elapsed);
                    }
                }
            }

            tracing::info!("Acquisition finished after {} frames", produced);
            Ok(produced)
        })
        .context("Failed to spawn acquisition thread")
}
