//! Basin filling for stalled water particles.
//!
//! A flood grows a set of cells at the water plane from the stall point, tracks
//! the cells walling it in on a min-heap, and raises the plane toward the
//! lowest wall until either a lower cell (drain) is reached or the volume runs
//! out.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::IVec2;
use tracing::debug;

use super::cascade::NEIGHBOURS_8;
use super::config::WaterConfig;
use crate::soil::SoilType;
use crate::terrain::Terrain;

#[derive(Clone, Copy, Debug)]
struct HeapItem {
    height: f64,
    idx: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.height == other.height && self.idx == other.idx
    }
}

impl Eq for HeapItem {}

// Min-heap by height via reversed ordering.
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .height
            .total_cmp(&self.height)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

/// How a flood ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloodOutcome {
    /// The basin reached a cell below the plane; flow resumes from `drain`.
    Drained { drain: IVec2 },
    /// The volume was used up raising the plane.
    Exhausted,
    /// No wall left to rise toward; the rest of the volume was spread over the basin.
    Sealed,
}

/// Result of [`flood_basin`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloodReport {
    pub outcome: FloodOutcome,
    /// Volume left to the particle.
    pub volume: f64,
    /// Final water plane.
    pub plane: f64,
    /// Number of cells in the basin.
    pub cells: usize,
}

/// Fills the basin around `start` with `volume` of water.
///
/// Standing water is written as `WATER` segments; `volume` converts to
/// thickness through `config.volume_factor`.
pub fn flood_basin(terrain: &mut Terrain, start: IVec2, volume: f64, config: &WaterConfig) -> FloodReport {
    let eps = config.plane_epsilon;
    let vf = config.volume_factor;
    let mut volume = volume;

    let mut tried = vec![false; terrain.width() * terrain.depth()];
    let mut basin: Vec<IVec2> = Vec::new();
    let mut walls = BinaryHeap::new();
    let mut stack: Vec<IVec2> = Vec::new();

    let mut plane = terrain.height(start);
    let mut minbound = HeapItem {
        height: plane,
        idx: terrain.index(start),
    };

    while volume > config.min_volume {
        let mut drain: Option<HeapItem> = None;

        stack.push(terrain.cell_of(minbound.idx));
        while let Some(cell) = stack.pop() {
            if !terrain.in_bounds(cell) {
                continue;
            }
            let idx = terrain.index(cell);
            if tried[idx] {
                continue;
            }

            let height = terrain.height(cell);
            if height > plane + eps {
                walls.push(HeapItem { height, idx });
                continue;
            }
            if height < plane - eps {
                if drain.map_or(true, |d| height < d.height) {
                    drain = Some(HeapItem { height, idx });
                }
                continue;
            }

            tried[idx] = true;
            basin.push(cell);
            stack.extend(NEIGHBOURS_8.iter().map(|&o| cell + o));
        }

        if basin.is_empty() {
            break;
        }

        if let Some(drain) = drain {
            plane = minbound.height;
            for &cell in &basin {
                if terrain.surface(cell) != SoilType::WATER {
                    continue;
                }
                let excess = terrain.height(cell) - plane;
                if excess <= 0.0 {
                    continue;
                }
                let remainder = terrain.remove(cell, excess);
                volume += (excess - remainder) / vf;
            }

            let drain = terrain.cell_of(drain.idx);
            debug!(start = %start, drain = %drain, cells = basin.len(), plane, "flood drained");
            return FloodReport {
                outcome: FloodOutcome::Drained { drain },
                volume,
                plane,
                cells: basin.len(),
            };
        }

        let next = loop {
            match walls.pop() {
                Some(item) if tried[item.idx] => continue,
                other => break other,
            }
        };

        let n = basin.len() as f64;
        let Some(next) = next else {
            plane += volume / n * vf;
            raise_to(terrain, &basin, plane);
            debug!(start = %start, cells = basin.len(), plane, "flood sealed");
            return FloodReport {
                outcome: FloodOutcome::Sealed,
                volume: 0.0,
                plane,
                cells: basin.len(),
            };
        };
        minbound = next;

        let rise = volume / n * vf;
        if plane + rise >= minbound.height {
            volume -= (minbound.height - plane) * n / vf;
            plane = minbound.height;
        } else {
            volume = 0.0;
            plane += rise;
        }
        raise_to(terrain, &basin, plane);
    }

    debug!(start = %start, cells = basin.len(), plane, "flood exhausted");
    FloodReport {
        outcome: FloodOutcome::Exhausted,
        volume: volume.max(0.0),
        plane,
        cells: basin.len(),
    }
}

fn raise_to(terrain: &mut Terrain, basin: &[IVec2], plane: f64) {
    for &cell in basin {
        let depth = plane - terrain.height(cell);
        terrain.deposit(cell, depth, SoilType::WATER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil::SoilProfile;
    use crate::terrain::TerrainConfig;

    fn rock() -> SoilType {
        let table = SoilProfile::default().build_table().unwrap();
        table.lookup("Rock").unwrap()
    }

    #[test]
    fn test_heap_pops_lowest_first() {
        let mut heap = BinaryHeap::new();
        for (i, h) in [0.5, 0.1, 0.9, 0.3].into_iter().enumerate() {
            heap.push(HeapItem { height: h, idx: i });
        }
        let order: Vec<_> = std::iter::from_fn(|| heap.pop()).map(|i| i.idx).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_closed_basin_conserves_volume() {
        let config = WaterConfig::default();
        let mut terrain = Terrain::new(7, 7, TerrainConfig::default());
        terrain.push_layer(rock(), |c| {
            if c.x == 0 || c.y == 0 || c.x == 6 || c.y == 6 {
                1.0
            } else {
                0.2
            }
        });

        let report = flood_basin(&mut terrain, IVec2::new(3, 3), 1.0, &config);
        assert_eq!(report.outcome, FloodOutcome::Exhausted);
        assert_eq!(report.cells, 25);
        assert_eq!(report.volume, 0.0);
        let water = terrain.volume_of(SoilType::WATER);
        assert!((water - 1.0 * config.volume_factor).abs() < 1e-9);
        assert!((terrain.height(IVec2::new(1, 1)) - report.plane).abs() < 1e-9);
        assert_eq!(terrain.surface(IVec2::new(0, 0)), rock());
    }

    #[test]
    fn test_basin_spills_over_lowest_rim() {
        let config = WaterConfig::default();
        let mut terrain = Terrain::new(5, 5, TerrainConfig::default());
        terrain.push_layer(rock(), |c| match (c.x, c.y) {
            (2, 2) => 0.5,
            (4, 2) => 0.2,
            _ => 1.0,
        });

        let report = flood_basin(&mut terrain, IVec2::new(2, 2), 2.0, &config);
        assert_eq!(report.outcome, FloodOutcome::Drained { drain: IVec2::new(4, 2) });
        assert!((report.plane - 1.0).abs() < 1e-9);

        // Pooled water plus what the particle keeps accounts for the input.
        let water = terrain.volume_of(SoilType::WATER);
        assert!((water - 0.5).abs() < 1e-9);
        assert!((water + report.volume * config.volume_factor - 2.0 * config.volume_factor).abs() < 1e-9);
    }

    #[test]
    fn test_flat_grid_seals_and_spreads() {
        let config = WaterConfig::default();
        let mut terrain = Terrain::new(16, 16, TerrainConfig::default());
        terrain.push_layer(rock(), |_| 0.2);

        let report = flood_basin(&mut terrain, IVec2::new(8, 8), 1.0, &config);
        assert_eq!(report.outcome, FloodOutcome::Sealed);
        assert_eq!(report.cells, 256);
        assert_eq!(terrain.surface(IVec2::new(0, 15)), SoilType::WATER);
        let water = terrain.volume_of(SoilType::WATER);
        assert!((water - config.volume_factor).abs() < 1e-9);
    }

    #[test]
    fn test_immediate_drain_leaves_terrain_untouched() {
        let config = WaterConfig::default();
        let mut terrain = Terrain::new(3, 1, TerrainConfig::default());
        terrain.push_layer(rock(), |c| 1.0 - 0.3 * c.x as f64);

        let report = flood_basin(&mut terrain, IVec2::new(1, 0), 1.0, &config);
        assert_eq!(report.outcome, FloodOutcome::Drained { drain: IVec2::new(2, 0) });
        assert_eq!(report.volume, 1.0);
        assert_eq!(terrain.volume_of(SoilType::WATER), 0.0);
    }
}
