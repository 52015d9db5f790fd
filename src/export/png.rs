//! PNG export of terrain rasters.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageBuffer, ImageEncoder, Luma};
use thiserror::Error;

use super::snapshot::RasterSnapshot;

/// Errors that can occur during PNG export.
#[derive(Error, Debug)]
pub enum PngExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid height range: min ({0}) >= max ({1})")]
    InvalidHeightRange(f32, f32),
}

/// Options for PNG export.
#[derive(Debug, Clone)]
pub struct PngExportOptions {
    /// Height mapped to black.
    pub min_height: f32,
    /// Height mapped to white.
    pub max_height: f32,
    /// PNG compression type.
    pub compression: CompressionType,
    /// PNG filter type.
    pub filter: FilterType,
}

impl Default for PngExportOptions {
    fn default() -> Self {
        Self {
            min_height: 0.0,
            max_height: 1.0,
            compression: CompressionType::Default,
            filter: FilterType::Adaptive,
        }
    }
}

impl PngExportOptions {
    /// Creates options spanning the snapshot's height range.
    ///
    /// A flat snapshot gets a unit range above its height.
    pub fn auto_range(snapshot: &RasterSnapshot) -> Self {
        let (min, max) = snapshot.height_range();
        let max = if max > min { max } else { min + 1.0 };
        Self {
            min_height: min,
            max_height: max,
            ..Default::default()
        }
    }
}

/// Writes heights as a 16-bit grayscale PNG.
pub fn export_height_png(
    snapshot: &RasterSnapshot,
    path: &Path,
    options: &PngExportOptions,
) -> Result<(), PngExportError> {
    let min = options.min_height;
    let max = options.max_height;

    if min >= max {
        return Err(PngExportError::InvalidHeightRange(min, max));
    }
    let range = max - min;

    let mut img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::new(snapshot.width, snapshot.depth);
    for z in 0..snapshot.depth {
        for x in 0..snapshot.width {
            let normalized = ((snapshot.height(x, z) - min) / range).clamp(0.0, 1.0);
            img.put_pixel(x, z, Luma([(normalized * 65535.0) as u16]));
        }
    }

    let byte_slice: &[u8] = bytemuck::cast_slice(img.as_raw());
    write_png(path, options, byte_slice, snapshot, image::ExtendedColorType::L16)
}

/// Writes surface colors as an 8-bit RGBA PNG.
pub fn export_color_png(
    snapshot: &RasterSnapshot,
    path: &Path,
    options: &PngExportOptions,
) -> Result<(), PngExportError> {
    let byte_slice: &[u8] = bytemuck::cast_slice(snapshot.colors.as_slice());
    write_png(path, options, byte_slice, snapshot, image::ExtendedColorType::Rgba8)
}

/// Writes surface normals as an 8-bit RGB PNG (x, z, up mapped from [-1, 1]).
pub fn export_normal_png(
    snapshot: &RasterSnapshot,
    path: &Path,
    options: &PngExportOptions,
) -> Result<(), PngExportError> {
    let encode = |v: f32| ((v * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8;
    let data: Vec<u8> = snapshot
        .normals
        .iter()
        .flat_map(|n| [encode(n[0]), encode(n[2]), encode(n[1])])
        .collect();
    write_png(path, options, &data, snapshot, image::ExtendedColorType::Rgb8)
}

fn write_png(
    path: &Path,
    options: &PngExportOptions,
    data: &[u8],
    snapshot: &RasterSnapshot,
    color: image::ExtendedColorType,
) -> Result<(), PngExportError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let encoder = PngEncoder::new_with_quality(writer, options.compression, options.filter);
    encoder.write_image(data, snapshot.width, snapshot.depth, color)?;
    Ok(())
}
