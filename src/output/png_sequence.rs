use super::SilhouetteSink;
use crate::frame::Silhouette;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes each silhouette as `silhouette_<frame id>.png` into a directory.
pub struct PngSequenceOutput {
    dir: PathBuf,
    written: u64,
}

impl PngSequenceOutput {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tracing::info!("Writing silhouettes to {}", dir.display());

        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        Ok(Self { dir, written: 0 })
    }

    pub fn path_for(&self, frame_id: u64) -> PathBuf {
        self.dir.join(format!("silhouette_{:06}.png", frame_id))
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl SilhouetteSink for PngSequenceOutput {
    fn write_silhouette(&mut self, frame_id: u64, silhouette: &Silhouette) -> Result<()> {
        let path = self.path_for(frame_id);
        silhouette
            .save(&path)
            .with_context(|| format!("Failed to write silhouette to {}", path.display()))?;
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn writes_numbered_pngs() {
        let dir = tempfile::tempdir().unwrap();
        let mut output = PngSequenceOutput::new(dir.path().join("masks")).unwrap();

        let mut silhouette = Silhouette::new(8, 6);
        silhouette.put_pixel(3, 2, Luma([255]));
        output.write_silhouette(42, &silhouette).unwrap();

        let path = output.path_for(42);
        assert!(path.ends_with("silhouette_000042.png"));
        let read_back = image::open(&path).unwrap().to_luma8();
        assert_eq!(read_back, silhouette);
        assert_eq!(output.written(), 1);
    }
}
