//! Read-only raster copy of the terrain surface.

use glam::IVec2;
use rayon::prelude::*;

use crate::soil::SoilTable;
use crate::terrain::Terrain;

/// Per-cell height, surface color and normal, row-major.
#[derive(Debug, Clone)]
pub struct RasterSnapshot {
    pub width: u32,
    pub depth: u32,
    pub heights: Vec<f32>,
    pub colors: Vec<[u8; 4]>,
    /// Normals as (x, up, z).
    pub normals: Vec<[f32; 3]>,
}

impl RasterSnapshot {
    /// Samples every cell of `terrain`.
    pub fn capture(terrain: &Terrain, table: &SoilTable) -> Self {
        let cells = terrain.width() * terrain.depth();
        let samples: Vec<(f32, [u8; 4], [f32; 3])> = (0..cells)
            .into_par_iter()
            .map(|idx| {
                let cell = terrain.cell_of(idx);
                let n = terrain.normal(cell);
                (
                    terrain.height(cell) as f32,
                    table.param(terrain.surface(cell)).color_rgba8(),
                    [n.x as f32, n.y as f32, n.z as f32],
                )
            })
            .collect();

        let mut snapshot = Self {
            width: terrain.width() as u32,
            depth: terrain.depth() as u32,
            heights: Vec::with_capacity(cells),
            colors: Vec::with_capacity(cells),
            normals: Vec::with_capacity(cells),
        };
        for (h, c, n) in samples {
            snapshot.heights.push(h);
            snapshot.colors.push(c);
            snapshot.normals.push(n);
        }
        snapshot
    }

    /// Height at `(x, z)`.
    pub fn height(&self, x: u32, z: u32) -> f32 {
        self.heights[(z * self.width + x) as usize]
    }

    /// Minimum and maximum height.
    pub fn height_range(&self) -> (f32, f32) {
        self.heights
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| (lo.min(h), hi.max(h)))
    }

    /// Cells whose value differs from `previous`, for incremental consumers.
    pub fn changed_since(&self, previous: &RasterSnapshot) -> Vec<IVec2> {
        if previous.width != self.width || previous.depth != self.depth {
            return (0..self.width * self.depth)
                .map(|i| IVec2::new((i % self.width) as i32, (i / self.width) as i32))
                .collect();
        }
        (0..self.heights.len())
            .filter(|&i| self.heights[i] != previous.heights[i] || self.colors[i] != previous.colors[i])
            .map(|i| IVec2::new((i as u32 % self.width) as i32, (i as u32 / self.width) as i32))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil::{SoilProfile, SoilType};
    use crate::terrain::TerrainConfig;

    #[test]
    fn test_capture_matches_terrain() {
        let table = SoilProfile::default().build_table().unwrap();
        let rock = table.lookup("Rock").unwrap();
        let mut terrain = Terrain::new(6, 4, TerrainConfig::default());
        terrain.push_layer(rock, |c| 0.1 * c.x as f64);
        terrain.deposit(IVec2::new(2, 3), 0.5, SoilType::WATER);

        let snap = RasterSnapshot::capture(&terrain, &table);
        assert_eq!((snap.width, snap.depth), (6, 4));
        assert_eq!(snap.heights.len(), 24);
        assert!((snap.height(5, 0) - 0.5).abs() < 1e-6);
        assert_eq!(snap.colors[3 * 6 + 2], table.param(SoilType::WATER).color_rgba8());
        assert_eq!(snap.colors[0], table.param(SoilType::AIR).color_rgba8());
        assert!(snap.normals.iter().all(|n| n[1] > 0.0));

        let (lo, hi) = snap.height_range();
        assert_eq!(lo, 0.0);
        assert!((hi - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_changed_since() {
        let table = SoilProfile::default().build_table().unwrap();
        let rock = table.lookup("Rock").unwrap();
        let mut terrain = Terrain::new(4, 4, TerrainConfig::default());
        terrain.push_layer(rock, |_| 0.3);
        let before = RasterSnapshot::capture(&terrain, &table);
        terrain.deposit(IVec2::new(1, 2), 0.1, rock);
        let after = RasterSnapshot::capture(&terrain, &table);
        assert_eq!(after.changed_since(&before), vec![IVec2::new(1, 2)]);
    }
}
