//! Vector-to-raster conversion and raster metadata probing.

use async_trait::async_trait;
use imagesize::{ImageError, ImageType};
use thiserror::Error;

use crate::application::render::types::ImageDimensions;

/// Density at which one SVG user unit maps to one pixel.
pub const BASE_DENSITY: f64 = 72.0;
pub const DEFAULT_MAX_PIXELS: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Error)]
pub enum RasterError {
    #[error("failed to parse SVG: {0}")]
    SvgParse(String),
    #[error("raster of {width}x{height} exceeds the pixel budget of {max_pixels}")]
    TooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },
    #[error("failed to allocate pixmap for raster rendering")]
    PixmapAlloc,
    #[error("failed to encode PNG: {0}")]
    PngEncode(String),
    #[error("unsupported raster format")]
    UnsupportedFormat,
    #[error("corrupted raster data")]
    Corrupted,
    #[error("raster worker failed: {0}")]
    Worker(String),
}

/// Rasterization density in DPI for a request scale. Fractional scales are
/// floored to the base density so small scales never render below 72 DPI.
pub fn raster_density(scale: f64) -> f64 {
    scale.max(1.0) * BASE_DENSITY
}

#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Convert SVG bytes to PNG bytes at `density` DPI.
    async fn rasterize(&self, svg: Vec<u8>, density: f64) -> Result<Vec<u8>, RasterError>;

    /// Read width, height, byte size and format from raster headers without
    /// decoding pixel data.
    fn probe(&self, raster: &[u8]) -> Result<ImageDimensions, RasterError> {
        probe_dimensions(raster)
    }
}

/// `resvg`-backed rasterizer. Rendering runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct ResvgRasterizer {
    max_pixels: u64,
}

impl ResvgRasterizer {
    pub fn new(max_pixels: u64) -> Self {
        Self { max_pixels }
    }
}

impl Default for ResvgRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PIXELS)
    }
}

#[async_trait]
impl Rasterizer for ResvgRasterizer {
    async fn rasterize(&self, svg: Vec<u8>, density: f64) -> Result<Vec<u8>, RasterError> {
        let max_pixels = self.max_pixels;
        tokio::task::spawn_blocking(move || svg_to_png(&svg, density, max_pixels))
            .await
            .map_err(|err| RasterError::Worker(err.to_string()))?
    }
}

/// Synchronous SVG→PNG conversion. The SVG's intrinsic size is taken to be at
/// [`BASE_DENSITY`], so the output is scaled by `density / 72`.
pub fn svg_to_png(svg: &[u8], density: f64, max_pixels: u64) -> Result<Vec<u8>, RasterError> {
    let options = usvg::Options::default();
    let tree =
        usvg::Tree::from_data(svg, &options).map_err(|err| RasterError::SvgParse(err.to_string()))?;

    let zoom = (density / BASE_DENSITY) as f32;
    let size = tree.size();
    let width = (size.width() * zoom).ceil().max(1.0) as u32;
    let height = (size.height() * zoom).ceil().max(1.0) as u32;

    if u64::from(width) * u64::from(height) > max_pixels {
        return Err(RasterError::TooLarge {
            width,
            height,
            max_pixels,
        });
    }

    let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or(RasterError::PixmapAlloc)?;
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(zoom, zoom),
        &mut pixmap.as_mut(),
    );

    pixmap
        .encode_png()
        .map_err(|err| RasterError::PngEncode(err.to_string()))
}

pub fn probe_dimensions(raster: &[u8]) -> Result<ImageDimensions, RasterError> {
    let image_type = imagesize::image_type(raster).map_err(map_image_error)?;
    let size = imagesize::blob_size(raster).map_err(map_image_error)?;

    let width = u32::try_from(size.width).map_err(|_| RasterError::Corrupted)?;
    let height = u32::try_from(size.height).map_err(|_| RasterError::Corrupted)?;

    Ok(ImageDimensions {
        width,
        height,
        byte_size: raster.len() as u64,
        format: format_name(&image_type).to_string(),
    })
}

fn map_image_error(err: ImageError) -> RasterError {
    match err {
        ImageError::NotSupported => RasterError::UnsupportedFormat,
        ImageError::CorruptedImage | ImageError::IoError(_) => RasterError::Corrupted,
    }
}

fn format_name(image_type: &ImageType) -> &'static str {
    match image_type {
        ImageType::Png => "png",
        ImageType::Jpeg => "jpeg",
        ImageType::Gif => "gif",
        ImageType::Webp => "webp",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10" viewBox="0 0 20 10"><path d="M0 0H20V10H0Z"/></svg>"#;

    #[test]
    fn density_is_floored_at_base() {
        assert_eq!(raster_density(1.0), 72.0);
        assert_eq!(raster_density(2.0), 144.0);
        assert_eq!(raster_density(0.1), 72.0);
        assert_eq!(raster_density(0.5), 72.0);
        assert_eq!(raster_density(100.0), 7200.0);
    }

    #[test]
    fn png_size_follows_density() {
        let png = svg_to_png(SQUARE.as_bytes(), 72.0, DEFAULT_MAX_PIXELS).unwrap();
        let dims = probe_dimensions(&png).unwrap();
        assert_eq!((dims.width, dims.height), (20, 10));
        assert_eq!(dims.format, "png");
        assert_eq!(dims.byte_size, png.len() as u64);

        let png = svg_to_png(SQUARE.as_bytes(), 144.0, DEFAULT_MAX_PIXELS).unwrap();
        let dims = probe_dimensions(&png).unwrap();
        assert_eq!((dims.width, dims.height), (40, 20));
    }

    #[test]
    fn pixel_budget_is_enforced() {
        let err = svg_to_png(SQUARE.as_bytes(), 7200.0, 1_000).unwrap_err();
        assert!(matches!(err, RasterError::TooLarge { .. }));
    }

    #[test]
    fn malformed_svg_is_rejected() {
        let err = svg_to_png(b"<svg", 72.0, DEFAULT_MAX_PIXELS).unwrap_err();
        assert!(matches!(err, RasterError::SvgParse(_)));
    }

    #[test]
    fn probe_rejects_non_image_bytes() {
        assert!(probe_dimensions(b"definitely not an image").is_err());
    }

    #[tokio::test]
    async fn resvg_rasterizer_runs_off_thread() {
        let rasterizer = ResvgRasterizer::default();
        let png = rasterizer
            .rasterize(SQUARE.as_bytes().to_vec(), 144.0)
            .await
            .unwrap();
        let dims = rasterizer.probe(&png).unwrap();
        assert_eq!(dims.width, 40);
    }
}
