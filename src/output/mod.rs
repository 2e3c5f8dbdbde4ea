mod png_sequence;

pub use png_sequence::PngSequenceOutput;

use crate::frame::Silhouette;
use anyhow::Result;

/// Trait for silhouette consumers
pub trait SilhouetteSink {
    /// Hand over the silhouette computed for capture `frame_id`
    fn write_silhouette(&mut self, frame_id: u64, silhouette: &Silhouette) -> Result<()>;
}

/// Sink that drops every silhouette.
#[derive(Debug, Default)]
pub struct DiscardOutput;

impl SilhouetteSink for DiscardOutput {
    fn write_silhouette(&mut self, _frame_id: u64, _silhouette: &Silhouette) -> Result<()> {
        Ok(())
    }
}
