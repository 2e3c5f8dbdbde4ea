use crate::capture::FrameChannel;
use crate::frame::Silhouette;
use crate::output::SilhouetteSink;
use crate::segmentation::HandSegmenter;
use anyhow::{Context, Result};
use std::time::{Duration, Instant};

/// When the tracking loop should give up.
#[derive(Debug, Clone)]
pub struct TrackingLimits {
    /// Stop after this many frames have been taken from the channel
    pub max_frames: Option<u64>,
    /// How long one `consume` may wait before counting as a stall
    pub stall_timeout: Duration,
    /// Stop after this many stalls in a row
    pub max_consecutive_stalls: Option<u32>,
}

impl Default for TrackingLimits {
    fn default() -> Self {
        Self {
            max_frames: None,
            stall_timeout: Duration::from_secs(1),
            max_consecutive_stalls: Some(5),
        }
    }
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Default)]
pub struct TrackingStats {
    /// Frames segmented and handed to the sink
    pub processed: u64,
    /// Frames rejected by the segmenter
    pub skipped: u64,
    /// Processed frames whose silhouette was empty
    pub empty: u64,
    pub stalls: u64,
    pub last_frame_id: Option<u64>,
    pub last_silhouette: Option<Silhouette>,
}

/// Consume frames from `channel`, segment each one and hand the result to
/// `sink`, until a limit is hit.
///
/// Per-frame problems (wrong resolution, empty detections, stalls) are
/// logged and absorbed; only a failing sink aborts the loop.
pub fn run_tracking_loop<S>(
    channel: &FrameChannel,
    segmenter: &HandSegmenter,
    sink: &mut S,
    limits: &TrackingLimits,
) -> Result<TrackingStats>
where
    S: SilhouetteSink + ?Sized,
{
    let mut stats = TrackingStats::default();
    let mut consecutive_stalls = 0u32;
    let mut total_wait_time = Duration::ZERO;
    let mut total_segment_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;

    tracing::info!("Starting tracking loop");

    loop {
        let taken = stats.processed + stats.skipped;
        if limits.max_frames.is_some_and(|max| taken >= max) {
            break;
        }

        let wait_start = Instant::now();
        let packet = match channel.consume_timeout(limits.stall_timeout) {
            Ok(packet) => {
                consecutive_stalls = 0;
                packet
            }
            Err(err) => {
                stats.stalls += 1;
                consecutive_stalls += 1;
                tracing::warn!("{}", err);
                if limits
                    .max_consecutive_stalls
                    .is_some_and(|max| consecutive_stalls >= max)
                {
                    tracing::warn!("Giving up after {} stalls in a row", consecutive_stalls);
                    break;
                }
                continue;
            }
        };
        total_wait_time += wait_start.elapsed();

        let segment_start = Instant::now();
        let silhouette = match segmenter.segment(&packet.depth, &packet.color) {
            Ok(silhouette) => silhouette,
            Err(err) => {
                tracing::warn!("Skipping frame {}: {}", packet.id, err);
                stats.skipped += 1;
                continue;
            }
        };
        total_segment_time += segment_start.elapsed();

        let output_start = Instant::now();
        sink.write_silhouette(packet.id, &silhouette)
            .with_context(|| format!("Failed to write silhouette for frame {}", packet.id))?;
        total_output_time += output_start.elapsed();

        stats.processed += 1;
        if silhouette.pixels().all(|p| p[0] == 0) {
            stats.empty += 1;
        }
        stats.last_frame_id = Some(packet.id);
        stats.last_silhouette = Some(silhouette);

        // Log stats every 30 frames
        if stats.processed % 30 == 0 {
            let n = stats.processed as f64;
            let avg_wait_ms = total_wait_time.as_secs_f64() * 1000.0 / n;
            let avg_segment_ms = total_segment_time.as_secs_f64() * 1000.0 / n;
            let avg_output_ms = total_output_time.as_secs_f64() * 1000.0 / n;
            let total_ms = avg_wait_ms + avg_segment_ms + avg_output_ms;

            tracing::info!(
                "Frame {}: wait={:.1}ms, segment={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}, empty={}, skipped={}",
                stats.processed,
                avg_wait_ms,
                avg_segment_ms,
                avg_output_ms,
                total_ms,
                1000.0 / total_ms.max(f64::EPSILON),
                stats.empty,
                stats.skipped
            );
        }
    }

    tracing::info!(
        "Tracking loop finished: {} processed, {} skipped, {} stalls",
        stats.processed,
        stats.skipped,
        stats.stalls
    );
    Ok(stats)
}
