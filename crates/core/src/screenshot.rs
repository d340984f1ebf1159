//! Uploaded screenshots and their image-derived features.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::{Result, SpliceError};

/// Longest side of the copy used for pixel statistics.
const ANALYSIS_SIZE: u32 = 256;

/// Luminance step that counts as an edge between neighbouring pixels.
const EDGE_THRESHOLD: i16 = 24;

/// Coarse pixel statistics of a screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageFeatures {
    pub width: u32,
    pub height: u32,
    /// Width divided by height.
    pub aspect_ratio: f64,
    /// Mean luminance in `[0, 1]`.
    pub mean_luminance: f64,
    /// Share of horizontally adjacent pixel pairs that differ sharply, in `[0, 1]`.
    ///
    /// Text-heavy regions score high, flat backgrounds low.
    pub edge_density: f64,
    /// Mean channel spread per pixel in `[0, 1]`; photos score higher than UI chrome.
    pub colorfulness: f64,
}

impl ImageFeatures {
    /// Computes features from a decoded image.
    pub fn from_image(img: &DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        let small = if width > ANALYSIS_SIZE || height > ANALYSIS_SIZE {
            img.resize(ANALYSIS_SIZE, ANALYSIS_SIZE, FilterType::Triangle)
        } else {
            img.clone()
        };

        let rgb = small.to_rgb8();
        let luma = small.to_luma8();
        let (w, h) = luma.dimensions();
        let pixels = (w as u64 * h as u64).max(1) as f64;

        let mean_luminance = luma.pixels().map(|p| p.0[0] as f64).sum::<f64>() / pixels / 255.0;

        let mut edges = 0u64;
        let mut pairs = 0u64;
        for y in 0..h {
            for x in 1..w {
                let a = luma.get_pixel(x - 1, y).0[0] as i16;
                let b = luma.get_pixel(x, y).0[0] as i16;
                pairs += 1;
                if (a - b).abs() > EDGE_THRESHOLD {
                    edges += 1;
                }
            }
        }
        let edge_density = if pairs == 0 { 0.0 } else { edges as f64 / pairs as f64 };

        let colorfulness = rgb
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                let max = r.max(g).max(b) as f64;
                let min = r.min(g).min(b) as f64;
                (max - min) / 255.0
            })
            .sum::<f64>()
            / pixels;

        Self {
            width,
            height,
            aspect_ratio: width as f64 / height.max(1) as f64,
            mean_luminance,
            edge_density,
            colorfulness,
        }
    }
}

/// An uploaded image of a page section.
#[derive(Debug, Clone)]
pub struct Screenshot {
    bytes: Vec<u8>,
    mime: String,
    features: ImageFeatures,
}

impl Screenshot {
    /// Decodes an image from memory.
    ///
    /// # Errors
    ///
    /// [`SpliceError::MalformedUpload`] for empty or undecodable data.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(SpliceError::MalformedUpload("empty image".to_string()));
        }

        let format = image::guess_format(&bytes)
            .map_err(|e| SpliceError::MalformedUpload(format!("unrecognized image format: {e}")))?;
        let img = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| SpliceError::MalformedUpload(format!("failed to decode image: {e}")))?;

        let features = ImageFeatures::from_image(&img);
        if features.width == 0 || features.height == 0 {
            return Err(SpliceError::MalformedUpload("image has no pixels".to_string()));
        }

        Ok(Self { bytes, mime: format.to_mime_type().to_string(), features })
    }

    /// Loads and decodes an image file.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SpliceError::FileNotFound(path.to_path_buf()));
        }
        if !is_supported_format(path) {
            return Err(SpliceError::MalformedUpload(format!("unsupported file type: {}", path.display())));
        }
        Self::from_bytes(fs::read(path)?)
    }

    /// Raw encoded bytes as uploaded.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type of the encoded bytes, e.g. `image/png`.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn features(&self) -> &ImageFeatures {
        &self.features
    }
}

/// Check if a file path points to a supported image format.
pub fn is_supported_format(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();

    ImageFormat::from_extension(&ext).is_some_and(|f| {
        matches!(f, ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP | ImageFormat::Gif | ImageFormat::Bmp)
    })
}

/// Summary entry for a screenshot directory listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreenshotEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Lists image files in `dir`, sorted by name. A missing directory is empty.
pub fn list_screenshots(dir: &Path) -> Result<Vec<ScreenshotEntry>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && is_supported_format(&path) {
            entries.push(ScreenshotEntry { name: entry.file_name().to_string_lossy().into_owned(), path });
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn encode_png(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        img.write_with_encoder(encoder).unwrap();
        buf
    }

    #[test]
    fn test_flat_image_features() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 100, Rgb([255, 255, 255])));
        let shot = Screenshot::from_bytes(encode_png(&img)).unwrap();
        let features = shot.features();

        assert_eq!(features.width, 400);
        assert_eq!(features.height, 100);
        assert!((features.aspect_ratio - 4.0).abs() < f64::EPSILON);
        assert!(features.mean_luminance > 0.99);
        assert_eq!(features.edge_density, 0.0);
        assert_eq!(features.colorfulness, 0.0);
        assert_eq!(shot.mime(), "image/png");
    }

    #[test]
    fn test_striped_image_has_edges() {
        let img = RgbImage::from_fn(64, 64, |x, _| if x % 2 == 0 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
        let shot = Screenshot::from_bytes(encode_png(&DynamicImage::ImageRgb8(img))).unwrap();
        assert!(shot.features().edge_density > 0.9);
    }

    #[test]
    fn test_malformed_upload() {
        assert!(matches!(Screenshot::from_bytes(Vec::new()), Err(SpliceError::MalformedUpload(_))));
        assert!(matches!(
            Screenshot::from_bytes(b"definitely not an image".to_vec()),
            Err(SpliceError::MalformedUpload(_))
        ));
    }

    #[test]
    fn test_supported_formats() {
        assert!(is_supported_format(Path::new("shot.png")));
        assert!(is_supported_format(Path::new("shot.JPG")));
        assert!(is_supported_format(Path::new("shot.webp")));
        assert!(!is_supported_format(Path::new("notes.txt")));
    }

    #[test]
    fn test_list_screenshots() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.png"), b"x").unwrap();
        fs::write(tmp.path().join("a.jpg"), b"x").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"x").unwrap();

        let names: Vec<String> = list_screenshots(tmp.path()).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }
}
