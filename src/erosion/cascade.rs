//! Thermal erosion: slope-limited collapse of material into neighbouring cells.

use std::collections::VecDeque;

use glam::IVec2;

use crate::soil::{SoilTable, SoilType};
use crate::terrain::Terrain;

/// 8-neighbourhood in fixed scan order (ties keep this order).
pub(crate) const NEIGHBOURS_8: [IVec2; 8] = [
    IVec2::new(-1, -1),
    IVec2::new(-1, 0),
    IVec2::new(-1, 1),
    IVec2::new(0, -1),
    IVec2::new(0, 1),
    IVec2::new(1, -1),
    IVec2::new(1, 0),
    IVec2::new(1, 1),
];

/// Totals of one cascade call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CascadeStats {
    /// Number of cell pairs that exchanged material.
    pub transfers: usize,
    /// Volume removed from uphill cells.
    pub moved: f64,
    /// Cells processed, including re-cascades.
    pub visited: usize,
}

impl CascadeStats {
    pub fn merge(&mut self, other: CascadeStats) {
        self.transfers += other.transfers;
        self.moved += other.moved;
        self.visited += other.visited;
    }
}

/// Relaxes slopes around `cell` that exceed the uphill material's `max_slope`.
///
/// Neighbours are resolved lowest first. For each pair the uphill top segment
/// sheds `settling * excess / 2` (capped by its thickness), which lands on the
/// downhill cell as the uphill material's `cascades` type. A neighbour whose
/// top segment was used up is processed again with `budget - 1`.
pub fn cascade(terrain: &mut Terrain, table: &SoilTable, cell: IVec2, budget: u32) -> CascadeStats {
    let mut stats = CascadeStats::default();
    let mut work = VecDeque::from([(cell, budget)]);
    let mut neighbours: Vec<(IVec2, f64)> = Vec::with_capacity(8);

    while let Some((cell, budget)) = work.pop_front() {
        if !terrain.in_bounds(cell) {
            continue;
        }
        stats.visited += 1;

        neighbours.clear();
        neighbours.extend(
            NEIGHBOURS_8
                .iter()
                .map(|&o| cell + o)
                .filter(|&n| terrain.in_bounds(n))
                .map(|n| (n, terrain.height(n))),
        );
        neighbours.sort_by(|a, b| a.1.total_cmp(&b.1));

        for &(next, _) in &neighbours {
            let diff = terrain.height(cell) - terrain.height(next);
            if diff == 0.0 {
                continue;
            }
            let (uphill, downhill) = if diff > 0.0 { (cell, next) } else { (next, cell) };

            let Some(top) = terrain.top(uphill).copied() else {
                continue;
            };
            if top.soil == SoilType::AIR {
                continue;
            }
            let param = table.param(top.soil);

            let excess = diff.abs() - param.max_slope;
            if excess <= 0.0 {
                continue;
            }
            let transfer = (param.settling * excess / 2.0).min(top.thickness);
            if transfer <= 0.0 {
                continue;
            }

            let remainder = terrain.remove(uphill, transfer);
            let moved = transfer - remainder;
            terrain.deposit(downhill, moved, param.cascades);
            stats.transfers += 1;
            stats.moved += moved;

            let exhausted = remainder != 0.0 || transfer >= top.thickness;
            if exhausted && budget > 0 {
                work.push_back((next, budget - 1));
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil::SoilProfile;
    use crate::terrain::TerrainConfig;

    fn setup(w: usize, h: usize) -> (Terrain, SoilTable) {
        let table = SoilProfile::default().build_table().unwrap();
        (Terrain::new(w, h, TerrainConfig::default()), table)
    }

    #[test]
    fn test_flat_region_makes_no_transfers() {
        let (mut terrain, table) = setup(8, 8);
        let sand = table.lookup("Sand").unwrap();
        terrain.push_layer(sand, |_| 0.5);
        terrain.take_dirty();

        for y in 0..8 {
            for x in 0..8 {
                let stats = cascade(&mut terrain, &table, IVec2::new(x, y), 3);
                assert_eq!(stats.transfers, 0);
            }
        }
        assert!(terrain.take_dirty().is_empty());
    }

    #[test]
    fn test_spike_collapses_and_conserves_volume() {
        let (mut terrain, table) = setup(5, 5);
        let sand = table.lookup("Sand").unwrap();
        terrain.push_layer(sand, |_| 0.1);
        terrain.deposit(IVec2::new(2, 2), 1.0, sand);
        let before = terrain.total_volume();

        let stats = cascade(&mut terrain, &table, IVec2::new(2, 2), 0);
        assert_eq!(stats.transfers, 8);
        assert!(stats.moved > 0.0);
        assert!(terrain.height(IVec2::new(2, 2)) < 1.1);
        assert!(terrain.height(IVec2::new(1, 1)) > 0.1);
        assert!((terrain.total_volume() - before).abs() < 1e-9);
    }

    #[test]
    fn test_gentle_slope_is_stable() {
        let (mut terrain, table) = setup(3, 1);
        let rock = table.lookup("Rock").unwrap();
        let max_slope = table.param(rock).max_slope;
        terrain.push_layer(rock, |c| 1.0 + c.x as f64 * max_slope * 0.5);
        let stats = cascade(&mut terrain, &table, IVec2::new(1, 0), 2);
        assert_eq!(stats.transfers, 0);
    }

    #[test]
    fn test_cascade_target_material_lands_downhill() {
        let (mut terrain, table) = setup(2, 1);
        let rock = table.lookup("Rock").unwrap();
        let gravel = table.lookup("Gravel").unwrap();
        terrain.deposit(IVec2::new(0, 0), 1.0, rock);

        cascade(&mut terrain, &table, IVec2::new(0, 0), 0);
        assert_eq!(terrain.surface(IVec2::new(1, 0)), gravel);
        assert_eq!(terrain.surface(IVec2::new(0, 0)), rock);
    }

    #[test]
    fn test_budget_bounds_recascades() {
        let (mut terrain, table) = setup(9, 1);
        let sand = table.lookup("Sand").unwrap();
        let rock = table.lookup("Rock").unwrap();
        // Thin sand cap over a rock step, so the cap is used up immediately.
        terrain.push_layer(rock, |c| if c.x == 4 { 2.0 } else { 0.1 });
        terrain.deposit(IVec2::new(4, 0), 0.001, sand);

        let none = cascade(&mut terrain.clone(), &table, IVec2::new(4, 0), 0);
        let some = cascade(&mut terrain, &table, IVec2::new(4, 0), 2);
        assert_eq!(none.visited, 1);
        assert!(some.visited > 1);
        assert!(some.visited <= 1 + 2 + 4);
    }
}
