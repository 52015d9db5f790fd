//! Initial strata from per-layer fractal noise.

use serde::{Deserialize, Serialize};
use simdnoise::NoiseBuilder;
use tracing::debug;

use crate::soil::{SoilTable, SoilTableError};
use crate::terrain::Terrain;

/// Seed stride between successive layers.
const LAYER_SEED_STRIDE: i32 = 7919;

/// One full-grid layer of a single soil with noise-driven thickness.
///
/// Thickness at a cell is `max(min, bias + scale * n)` where `n` is fBm noise
/// normalised to [0, 1] over the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Soil name, resolved against the soil table.
    pub soil: String,
    /// Lower clamp on thickness.
    pub min: f64,
    /// Constant thickness offset.
    pub bias: f64,
    /// Noise amplitude.
    pub scale: f64,
    /// Number of noise octaves.
    pub octaves: u8,
    /// Frequency multiplier per octave.
    pub lacunarity: f64,
    /// Amplitude decay per octave.
    pub gain: f64,
    /// Base frequency in cycles across the longer grid edge.
    pub frequency: f64,
}

impl LayerConfig {
    /// Layer of `soil` with default noise parameters.
    pub fn for_soil(soil: &str) -> Self {
        Self {
            soil: soil.to_string(),
            min: 0.0,
            bias: 0.0,
            scale: 0.1,
            octaves: 6,
            lacunarity: 2.0,
            gain: 0.5,
            frequency: 4.0,
        }
    }

    /// Per-cell thickness for a `width x depth` grid, row-major.
    pub fn thickness_field(&self, width: usize, depth: usize, seed: i32) -> Vec<f64> {
        let extent = width.max(depth) as f64;
        let (noise, lo, hi) = NoiseBuilder::fbm_2d_offset(0.0, width, 0.0, depth)
            .with_seed(seed)
            .with_freq((self.frequency / extent) as f32)
            .with_octaves(self.octaves.max(1))
            .with_lacunarity(self.lacunarity as f32)
            .with_gain(self.gain as f32)
            .generate();

        let range = (hi - lo) as f64;
        noise
            .into_iter()
            .map(|v| {
                let n = if range > 0.0 { (v - lo) as f64 / range } else { 0.5 };
                (self.bias + self.scale * n).max(self.min)
            })
            .collect()
    }
}

/// Stacks `layers` bottom to top onto `terrain`.
///
/// Each layer gets its own seed derived from `seed`, so one seed reproduces
/// the whole column structure.
pub fn build_strata(
    terrain: &mut Terrain,
    table: &SoilTable,
    layers: &[LayerConfig],
    seed: u32,
) -> Result<(), SoilTableError> {
    let (width, depth) = (terrain.width(), terrain.depth());

    for (i, layer) in layers.iter().enumerate() {
        let soil = table
            .lookup(&layer.soil)
            .ok_or_else(|| SoilTableError::UnknownLayerSoil(layer.soil.clone()))?;

        let layer_seed = (seed as i32).wrapping_add(i as i32 * LAYER_SEED_STRIDE);
        let field = layer.thickness_field(width, depth, layer_seed);
        terrain.push_layer(soil, |cell| field[cell.y as usize * width + cell.x as usize]);

        debug!(layer = i, soil = %layer.soil, seed = layer_seed, "seeded layer");
    }
    Ok(())
}
