use handseg::frame::DepthFrame;
use handseg::segmentation::{
    load_classifier, DepthPreprocessor, HandSegmenter, HeuristicClassifier,
};
use handseg::SegmentationConfig;
use image::{Luma, RgbImage};
use std::io::Write;
use std::sync::Arc;

const W: u32 = 160;
const H: u32 = 120;

fn config() -> SegmentationConfig {
    SegmentationConfig {
        width: W,
        height: H,
        downsample_factor: 4,
        workers: 4,
        ..Default::default()
    }
}

fn in_square(x: u32, y: u32) -> bool {
    (60..100).contains(&x) && (40..80).contains(&y)
}

fn square_scene(near: u16) -> DepthFrame {
    DepthFrame::from_fn(W, H, |x, y| {
        if in_square(x, y) {
            Luma([near])
        } else {
            Luma([3000])
        }
    })
}

fn lit(mask: &image::GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] != 0).count()
}

#[test]
fn nothing_near_gives_empty_full_resolution_mask() {
    let segmenter = HandSegmenter::new(config(), Arc::new(HeuristicClassifier::default())).unwrap();

    // Far wall with invalid holes; zeros must never count as near
    let depth = DepthFrame::from_fn(W, H, |x, y| {
        if (x + y) % 11 == 0 {
            Luma([0])
        } else {
            Luma([1500])
        }
    });

    let report = segmenter
        .segment_detailed(&depth, &RgbImage::new(W, H))
        .unwrap();
    assert_eq!(report.candidates, 0);
    assert_eq!(report.silhouette.dimensions(), (W, H));
    assert_eq!(lit(&report.silhouette), 0);
}

#[test]
fn near_square_is_recovered() {
    let segmenter = HandSegmenter::new(config(), Arc::new(HeuristicClassifier::default())).unwrap();
    let depth = square_scene(500);

    let report = segmenter
        .segment_detailed(&depth, &RgbImage::new(W, H))
        .unwrap();

    // Dilation grows the mask into the background, the depth band cuts it
    // back to the square. The median filter has already rounded off the
    // square's four corner pixels.
    let clean = DepthPreprocessor::from_config(&config()).preprocess(&depth);
    for (x, y, p) in report.silhouette.enumerate_pixels() {
        let expected = in_square(x, y) && clean.full.get_pixel(x, y)[0] == 500;
        assert_eq!(p[0] != 0, expected, "pixel ({}, {})", x, y);
    }
    assert_eq!(lit(&report.silhouette), 40 * 40 - 4);
    assert!(report.band.contains(500));
    assert!(lit(&report.labelled) > 0);
}

#[test]
fn clutter_outside_depth_band_is_rejected() {
    let config = SegmentationConfig {
        near_plane: 1500,
        ..config()
    };
    let segmenter = HandSegmenter::new(config, Arc::new(HeuristicClassifier::default())).unwrap();

    let mut depth = square_scene(1000);
    // A patch touching the hand, classified as hand, but 200 mm behind it
    for y in 50..60 {
        for x in 100..104 {
            depth.put_pixel(x, y, Luma([1200]));
        }
    }

    let report = segmenter
        .segment_detailed(&depth, &RgbImage::new(W, H))
        .unwrap();
    assert_eq!(report.band.min, report.hand_depth.saturating_sub(100));
    assert!(report.band.contains(1000));
    assert!(!report.band.contains(1200));
    for y in 50..60 {
        for x in 100..104 {
            assert_eq!(report.silhouette.get_pixel(x, y)[0], 0);
        }
    }
    assert_eq!(report.silhouette.get_pixel(80, 60)[0], 255);
}

#[test]
fn forest_file_drives_the_pipeline() {
    // One stump that sends every sample to a "hand" leaf
    let forest = r#"{
        "n_features": 289,
        "n_classes": 3,
        "trees": [ { "nodes": [
            { "feature": 144, "threshold": 1000000.0, "left": 1, "right": 2 },
            { "distribution": [0.0, 1.0, 0.0] },
            { "distribution": [1.0, 0.0, 0.0] }
        ] } ]
    }"#;
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(forest.as_bytes()).unwrap();

    let classifier = load_classifier(file.path()).unwrap();
    let segmenter = HandSegmenter::new(config(), classifier).unwrap();

    let silhouette = segmenter
        .segment(&square_scene(500), &RgbImage::new(W, H))
        .unwrap();
    assert_eq!(lit(&silhouette), 40 * 40 - 4);
}

#[test]
fn repeated_calls_are_independent() {
    let segmenter = HandSegmenter::new(config(), Arc::new(HeuristicClassifier::default())).unwrap();
    let color = RgbImage::new(W, H);

    let first = segmenter.segment(&square_scene(500), &color).unwrap();
    let empty = segmenter
        .segment(&DepthFrame::from_pixel(W, H, Luma([2500])), &color)
        .unwrap();
    let again = segmenter.segment(&square_scene(500), &color).unwrap();

    assert_eq!(lit(&empty), 0);
    assert_eq!(first, again);
}
