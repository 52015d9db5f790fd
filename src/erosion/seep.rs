//! Whole-grid pore water pass.
//!
//! Standing water soaks into the segment beneath it, pore water sinks between
//! stacked segments, and saturated cells are re-cascaded.

use glam::IVec2;

use super::cascade::{cascade, CascadeStats};
use super::config::SeepConfig;
use crate::soil::{SoilTable, SoilType};
use crate::terrain::{Segment, Terrain};

const NEIGHBOURS_4: [IVec2; 4] = [IVec2::new(1, 0), IVec2::new(-1, 0), IVec2::new(0, 1), IVec2::new(0, -1)];

/// Totals of one seepage pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeepStats {
    /// Standing water moved into pores.
    pub infiltrated: f64,
    /// Pore water moved between segments.
    pub percolated: f64,
    /// Saturated cells that were re-cascaded.
    pub saturated_cells: usize,
    pub cascade: CascadeStats,
}

fn pore_volume(seg: &Segment, porosity: f64) -> f64 {
    porosity * seg.thickness
}

/// Water held in the pores of every segment of the grid.
pub fn pore_water(terrain: &Terrain, table: &SoilTable) -> f64 {
    let mut total = 0.0;
    for idx in 0..terrain.width() * terrain.depth() {
        for seg in terrain.segments(terrain.cell_of(idx)) {
            total += pore_volume(seg, table.param(seg.soil).porosity) * seg.saturation;
        }
    }
    total
}

/// Runs one seepage pass over the whole grid.
pub fn seep(terrain: &mut Terrain, table: &SoilTable, config: &SeepConfig) -> SeepStats {
    let mut stats = SeepStats::default();

    for idx in 0..terrain.width() * terrain.depth() {
        let cell = terrain.cell_of(idx);
        stats.infiltrated += infiltrate(terrain, table, cell, config.infiltration_rate);
        stats.percolated += percolate(terrain, table, cell, config.percolation_rate);
    }

    let saturated: Vec<IVec2> = (0..terrain.width() * terrain.depth())
        .map(|idx| terrain.cell_of(idx))
        .filter(|&cell| {
            let Some(top) = terrain.top(cell) else {
                return false;
            };
            if top.soil.is_fluid() || top.saturation < config.saturation_threshold {
                return false;
            }
            let height = top.ceiling();
            NEIGHBOURS_4
                .iter()
                .map(|&o| cell + o)
                .any(|n| terrain.in_bounds(n) && terrain.height(n) < height)
        })
        .collect();

    stats.saturated_cells = saturated.len();
    for cell in saturated {
        stats.cascade.merge(cascade(terrain, table, cell, config.cascade_budget));
    }
    stats
}

/// Moves standing water on top of `cell` into the segment beneath it.
fn infiltrate(terrain: &mut Terrain, table: &SoilTable, cell: IVec2, rate: f64) -> f64 {
    let column = terrain.column(cell);
    let Some((&top, rest)) = column.split_last() else {
        return 0.0;
    };
    let Some(&below) = rest.last() else {
        return 0.0;
    };

    let water = *terrain.segment(top);
    if water.soil != SoilType::WATER || water.thickness <= 0.0 {
        return 0.0;
    }
    let ground = *terrain.segment(below);
    let porosity = table.param(ground.soil).porosity;
    let pores = pore_volume(&ground, porosity);
    if ground.soil.is_fluid() || pores <= 0.0 {
        return 0.0;
    }

    let room = pores * (1.0 - ground.saturation);
    let flow = rate * porosity * water.thickness.min(room);
    if flow <= 0.0 {
        return 0.0;
    }

    let taken = flow - terrain.remove(cell, flow);
    let seg = terrain.segment_mut(below);
    seg.saturation = (seg.saturation + taken / pores).min(1.0);
    taken
}

/// Sinks pore water one segment down throughout the column at `cell`.
fn percolate(terrain: &mut Terrain, table: &SoilTable, cell: IVec2, rate: f64) -> f64 {
    let ids = terrain.column(cell).to_vec();
    let mut moved = 0.0;

    for pair in ids.windows(2).rev() {
        let (lower_id, upper_id) = (pair[0], pair[1]);
        let upper = *terrain.segment(upper_id);
        let lower = *terrain.segment(lower_id);
        if upper.soil.is_fluid() || lower.soil.is_fluid() {
            continue;
        }

        let upper_porosity = table.param(upper.soil).porosity;
        let upper_pores = pore_volume(&upper, upper_porosity);
        let lower_pores = pore_volume(&lower, table.param(lower.soil).porosity);
        if upper_pores <= 0.0 || lower_pores <= 0.0 {
            continue;
        }

        let held = upper_pores * upper.saturation;
        let room = lower_pores * (1.0 - lower.saturation);
        let flow = rate * upper_porosity * held.min(room);
        if flow <= 0.0 {
            continue;
        }

        terrain.segment_mut(upper_id).saturation = (held - flow) / upper_pores;
        terrain.segment_mut(lower_id).saturation = ((lower.saturation * lower_pores + flow) / lower_pores).min(1.0);
        moved += flow;
    }
    moved
}
