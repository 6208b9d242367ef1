//! Virtual background loading.

use std::path::Path;

use anyhow::{Context, Result};
use camfx_core::FrameBuffer;
use tracing::info;

/// Decode an image file into an RGBA frame.
pub fn load_background(path: &Path) -> Result<FrameBuffer> {
    let image = image::open(path)
        .with_context(|| format!("Failed to open background image {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    let frame = FrameBuffer::from_rgba(width, height, image.into_raw())?;
    info!(path = %path.display(), width, height, "Loaded virtual background");
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_round_trips_into_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        let mut img = image::RgbaImage::new(4, 3);
        img.put_pixel(1, 2, image::Rgba([10, 20, 30, 255]));
        img.save(&path).unwrap();

        let frame = load_background(&path).unwrap();
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(frame.pixel(1, 2), [10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_names_path() {
        let err = load_background(Path::new("/nonexistent/bg.png")).unwrap_err();
        assert!(format!("{err:#}").contains("bg.png"));
    }
}
