//! Export module for saving terrain rasters.
//!
//! A [`RasterSnapshot`] is a read-only copy of heights, surface colors and
//! normals; the PNG writers turn it into 16-bit height maps and 8-bit color
//! and normal maps.

mod png;
mod snapshot;

pub use png::{export_color_png, export_height_png, export_normal_png, PngExportError, PngExportOptions};
pub use snapshot::RasterSnapshot;
