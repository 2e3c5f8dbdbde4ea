use anyhow::{Context, Result};
use clap::Parser;
use handseg::capture::{spawn_acquisition, FrameChannel, SyntheticCapture};
use handseg::output::{DiscardOutput, PngSequenceOutput, SilhouetteSink};
use handseg::segmentation::{load_classifier, Classifier, HandSegmenter, HeuristicClassifier};
use handseg::tracking::{run_tracking_loop, TrackingLimits};
use handseg::SegmentationConfig;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file overriding segmentation parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the per-pixel classifier (.json forest, or .onnx with the onnx feature)
    /// If not provided, every near-sensor pixel is treated as hand
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Directory to write silhouettes into as PNGs
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Number of frames to capture and segment
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// Capture rate of the synthetic sensor (0 = as fast as segmentation allows)
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Worker threads for feature extraction and prediction
    #[arg(long)]
    workers: Option<usize>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("handseg starting");

    let mut config = match &args.config {
        Some(path) => SegmentationConfig::from_file(path)?,
        None => SegmentationConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    tracing::info!("Camera: {}x{}", config.width, config.height);
    tracing::info!("Frames: {}, target FPS: {}", args.frames, args.fps);

    // A missing or corrupt model is fatal
    let classifier: Arc<dyn Classifier> = match &args.model {
        Some(path) => load_classifier(path).context("Failed to load classifier")?,
        None => {
            tracing::info!("No model given, using heuristic classifier");
            Arc::new(HeuristicClassifier::default())
        }
    };

    let segmenter = HandSegmenter::new(config.clone(), classifier)?;

    let mut output: Box<dyn SilhouetteSink> = match &args.output_dir {
        Some(dir) => Box::new(
            PngSequenceOutput::new(dir).context("Failed to initialize silhouette output")?,
        ),
        None => Box::new(DiscardOutput),
    };

    let channel = Arc::new(FrameChannel::new());
    let source = SyntheticCapture::new(config.width, config.height);
    let acquisition = spawn_acquisition(source, Arc::clone(&channel), Some(args.frames), args.fps)?;

    let limits = TrackingLimits {
        max_frames: Some(args.frames),
        ..Default::default()
    };
    let stats = run_tracking_loop(&channel, &segmenter, output.as_mut(), &limits)?;

    match acquisition.join() {
        Ok(result) => {
            result.context("Acquisition failed")?;
        }
        Err(_) => anyhow::bail!("Acquisition thread panicked"),
    }

    tracing::info!(
        "Done: {} silhouettes ({} empty), {} frames skipped",
        stats.processed,
        stats.empty,
        stats.skipped
    );

    Ok(())
}
