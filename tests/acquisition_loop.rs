use handseg::capture::{spawn_acquisition, CaptureSource, FrameChannel, SyntheticCapture};
use handseg::output::PngSequenceOutput;
use handseg::segmentation::{HandSegmenter, HeuristicClassifier};
use handseg::tracking::{run_tracking_loop, TrackingLimits};
use handseg::SegmentationConfig;
use std::sync::Arc;

#[test]
fn consumer_sees_each_tick_whole() {
    let channel = Arc::new(FrameChannel::new());
    let source = SyntheticCapture::new(96, 72);
    let handle = spawn_acquisition(source, Arc::clone(&channel), Some(60), 0).unwrap();

    for expected in 0..60 {
        let packet = channel.consume();
        assert_eq!(packet.id, expected);

        // The hand finder's indicator pixels come from the same tick as the
        // depth image, so every one of them must land on the near square.
        let width = packet.depth.width();
        assert!(!packet.hand_finder.sensor_indicator.is_empty());
        for &index in &packet.hand_finder.sensor_indicator {
            let (x, y) = (index % width, index / width);
            assert_eq!(packet.depth.get_pixel(x, y)[0], 450, "tick {}", expected);
        }
        assert_eq!(packet.color.dimensions(), packet.depth.dimensions());
    }

    assert_eq!(handle.join().unwrap().unwrap(), 60);
}

#[test]
fn acquisition_feeds_segmentation_end_to_end() {
    let (width, height) = (160, 120);
    let config = SegmentationConfig {
        width,
        height,
        downsample_factor: 4,
        workers: 2,
        ..Default::default()
    };
    let segmenter = HandSegmenter::new(config, Arc::new(HeuristicClassifier::default())).unwrap();

    let channel = Arc::new(FrameChannel::new());
    let source = SyntheticCapture::new(width, height);
    let reference = SyntheticCapture::new(width, height);
    let handle = spawn_acquisition(source, Arc::clone(&channel), Some(12), 0).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut output = PngSequenceOutput::new(dir.path()).unwrap();
    let limits = TrackingLimits {
        max_frames: Some(12),
        ..Default::default()
    };

    let stats = run_tracking_loop(&channel, &segmenter, &mut output, &limits).unwrap();
    assert_eq!(handle.join().unwrap().unwrap(), 12);

    assert_eq!(stats.processed, 12);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.empty, 0);
    assert_eq!(output.written(), 12);
    assert!((0..12).all(|id| output.path_for(id).exists()));

    let last = stats.last_silhouette.unwrap();
    assert_eq!(last.dimensions(), reference.resolution());

    let (hx, hy) = reference.hand_origin(11);
    let side = height / 4;
    let mut lit = 0;
    for (x, y, p) in last.enumerate_pixels() {
        if p[0] != 0 {
            lit += 1;
            assert!(x >= hx && x < hx + side && y >= hy && y < hy + side);
        }
    }
    assert!(lit > 0);
}
