//! Real-time hand segmentation for depth sensors.
//!
//! An acquisition thread publishes frames into a [`capture::FrameChannel`];
//! the tracking thread takes them one at a time and runs
//! [`segmentation::HandSegmenter`], which turns each depth frame into a
//! binary hand silhouette at camera resolution.

pub mod capture;
pub mod config;
pub mod error;
pub mod frame;
pub mod output;
pub mod segmentation;
pub mod tracking;

pub use config::SegmentationConfig;
pub use error::SegmentationError;
pub use frame::{ColorFrame, DepthFrame, FramePacket, HandFinderState, Silhouette};
pub use segmentation::{Classifier, HandSegmenter};
