use std::io::Cursor;
use std::path::PathBuf;

use crate::errors::PilotResult;

/// Writes captured screenshots into a single directory.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> PilotResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Saves `bytes` as `<name>.png` and returns the written path.
    pub fn save(&self, name: &str, bytes: &[u8]) -> PilotResult<PathBuf> {
        let path = self.dir.join(format!("{name}.png"));
        std::fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "screenshot saved");
        Ok(path)
    }
}

/// Decodes `bytes`, flattens any alpha channel onto white and re-encodes as PNG.
pub fn normalize_png(bytes: &[u8]) -> PilotResult<Vec<u8>> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut rgb = image::RgbImage::new(w, h);
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = px[3] as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }

    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(rgb).write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
    Ok(out)
}

/// [`normalize_png`], falling back to the original bytes when decoding fails.
pub fn prepare_for_vision(bytes: Vec<u8>) -> Vec<u8> {
    match normalize_png(&bytes) {
        Ok(normalized) => normalized,
        Err(e) => {
            tracing::warn!(error = %e, "screenshot normalisation failed; sending raw bytes");
            bytes
        }
    }
}
