//! Layered terrain: a grid of run-length encoded segment stacks.

use glam::{DVec2, DVec3, IVec2};
use tracing::warn;

use super::config::{RemovalPolicy, TerrainConfig};
use super::pool::{MaterialPool, Segment, SegmentId};
use super::traffic::TrafficField;
use crate::soil::{SoilTable, SoilType};

/// Fixed-size grid of material columns.
///
/// Each column is an ordered bottom-to-top list of segment handles into a
/// single [`MaterialPool`]. Adjacent segments of one column never share a
/// material, and a segment's `floor` equals the summed thickness below it.
#[derive(Debug, Clone)]
pub struct Terrain {
    width: usize,
    depth: usize,
    config: TerrainConfig,
    columns: Vec<Vec<SegmentId>>,
    pool: MaterialPool,
    traffic: TrafficField,
    dirty: Vec<bool>,
    dirty_cells: Vec<usize>,
    residue_events: u64,
}

impl Terrain {
    /// Creates an empty terrain; the pool holds `width*depth*avg_layers` segments.
    pub fn new(width: usize, depth: usize, config: TerrainConfig) -> Self {
        assert!(width > 0 && depth > 0, "terrain must have at least one cell");
        let cells = width * depth;
        let capacity = cells * config.avg_layers.max(1);
        Self {
            width,
            depth,
            config,
            columns: vec![Vec::new(); cells],
            pool: MaterialPool::new(capacity),
            traffic: TrafficField::new(cells),
            dirty: vec![false; cells],
            dirty_cells: Vec::new(),
            residue_events: 0,
        }
    }

    /// Drops all material and traffic; the terrain is bare ground again.
    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        self.pool.reset();
        self.traffic.clear();
        for idx in 0..self.columns.len() {
            self.mark_dirty(idx);
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid extent along the second (z) axis.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Grid dimensions as a vector.
    pub fn dim(&self) -> IVec2 {
        IVec2::new(self.width as i32, self.depth as i32)
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn pool(&self) -> &MaterialPool {
        &self.pool
    }

    /// Mutable pool access, used to allocate segments passed to [`Terrain::add`].
    pub fn pool_mut(&mut self) -> &mut MaterialPool {
        &mut self.pool
    }

    pub fn traffic(&self) -> &TrafficField {
        &self.traffic
    }

    pub fn traffic_mut(&mut self) -> &mut TrafficField {
        &mut self.traffic
    }

    /// Folds this tick's particle traffic into the frequency field.
    pub fn end_tick(&mut self) {
        self.traffic.end_tick(&self.config.traffic);
    }

    #[inline]
    pub fn in_bounds(&self, cell: IVec2) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.depth
    }

    /// Row-major index of `cell`. Out-of-bounds cells are a caller error.
    #[inline]
    pub fn index(&self, cell: IVec2) -> usize {
        debug_assert!(self.in_bounds(cell), "cell {cell} outside {}x{}", self.width, self.depth);
        cell.y as usize * self.width + cell.x as usize
    }

    /// Inverse of [`Terrain::index`].
    #[inline]
    pub fn cell_of(&self, idx: usize) -> IVec2 {
        IVec2::new((idx % self.width) as i32, (idx / self.width) as i32)
    }

    #[inline]
    fn clamp_cell(&self, cell: IVec2) -> IVec2 {
        cell.clamp(IVec2::ZERO, self.dim() - IVec2::ONE)
    }

    /// Nearest cell to a continuous position.
    #[inline]
    pub fn cell_at(pos: DVec2) -> IVec2 {
        pos.round().as_ivec2()
    }

    /// Segment handles of a column, bottom to top.
    pub fn column(&self, cell: IVec2) -> &[SegmentId] {
        &self.columns[self.index(cell)]
    }

    /// Number of segments stacked at `cell`.
    pub fn segment_count(&self, cell: IVec2) -> usize {
        self.columns[self.index(cell)]
            .iter()
            .filter(|&&id| self.pool.segment(id).thickness > 0.0)
            .count()
    }

    /// Segments of a column, bottom to top.
    pub fn segments(&self, cell: IVec2) -> impl Iterator<Item = &Segment> + '_ {
        self.column(cell).iter().map(|&id| self.pool.segment(id))
    }

    #[inline]
    pub fn segment(&self, id: SegmentId) -> &Segment {
        self.pool.segment(id)
    }

    /// Direct segment access for in-place property edits (saturation).
    /// Thickness must be changed through `add`/`remove` only.
    #[inline]
    pub(crate) fn segment_mut(&mut self, id: SegmentId) -> &mut Segment {
        self.pool.segment_mut(id)
    }

    /// Topmost segment with material, skipping a lazily emptied one.
    fn effective_top(&self, idx: usize) -> Option<SegmentId> {
        self.columns[idx]
            .iter()
            .rev()
            .copied()
            .find(|&id| self.pool.segment(id).thickness > 0.0)
    }

    /// Top segment of a column, for parameter lookups.
    pub fn top(&self, cell: IVec2) -> Option<&Segment> {
        self.effective_top(self.index(cell)).map(|id| self.pool.segment(id))
    }

    /// Mutable top segment. Only non-geometric fields (saturation) may be edited.
    pub fn top_mut(&mut self, cell: IVec2) -> Option<&mut Segment> {
        let id = self.effective_top(self.index(cell))?;
        Some(self.pool.segment_mut(id))
    }

    /// Handle of the top segment of a column.
    pub fn top_id(&self, cell: IVec2) -> Option<SegmentId> {
        self.effective_top(self.index(cell))
    }

    /// Surface height of a cell (0 for bare ground).
    #[inline]
    pub fn height(&self, cell: IVec2) -> f64 {
        let idx = self.index(cell);
        self.effective_top(idx)
            .map(|id| self.pool.segment(id).ceiling())
            .unwrap_or(0.0)
    }

    /// Bilinearly interpolated height at a continuous position.
    pub fn height_at(&self, pos: DVec2) -> f64 {
        let base = pos.floor();
        let w = pos - base;
        let p = base.as_ivec2();

        let h00 = self.height(self.clamp_cell(p));
        let h10 = self.height(self.clamp_cell(p + IVec2::X));
        let h01 = self.height(self.clamp_cell(p + IVec2::Y));
        let h11 = self.height(self.clamp_cell(p + IVec2::ONE));

        (1.0 - w.x) * (1.0 - w.y) * h00
            + w.x * (1.0 - w.y) * h10
            + (1.0 - w.x) * w.y * h01
            + w.x * w.y * h11
    }

    /// Material at the surface of a cell (Air when bare).
    pub fn surface(&self, cell: IVec2) -> SoilType {
        self.top(cell).map(|s| s.soil).unwrap_or(SoilType::AIR)
    }

    /// Display color of the surface material.
    pub fn color(&self, cell: IVec2, table: &SoilTable) -> [f32; 4] {
        table.param(self.surface(cell)).color
    }

    /// Surface normal (y up) from up to four triangles around `cell`.
    ///
    /// The horizontal part `(n.x, n.z)` points downhill.
    pub fn normal(&self, cell: IVec2) -> DVec3 {
        let scale = self.config.vertical_scale;
        let at = |c: IVec2| DVec3::new(c.x as f64, scale * self.height(c), c.y as f64);
        let p = at(cell);

        let left = cell.x > 0;
        let right = (cell.x as usize) + 1 < self.width;
        let down = cell.y > 0;
        let up = (cell.y as usize) + 1 < self.depth;

        let mut n = DVec3::ZERO;
        if left && down {
            let b = at(cell - IVec2::X);
            let c = at(cell - IVec2::Y);
            n += (c - p).cross(b - p);
        }
        if left && up {
            let b = at(cell - IVec2::X);
            let c = at(cell + IVec2::Y);
            n -= (c - p).cross(b - p);
        }
        if right && down {
            let b = at(cell + IVec2::X);
            let c = at(cell - IVec2::Y);
            n -= (c - p).cross(b - p);
        }
        if right && up {
            let b = at(cell + IVec2::X);
            let c = at(cell + IVec2::Y);
            n += (c - p).cross(b - p);
        }

        n.try_normalize().unwrap_or(DVec3::Y)
    }

    /// Bilinear blend of the four surrounding cell normals.
    pub fn normal_at(&self, pos: DVec2) -> DVec3 {
        let base = pos.floor();
        let w = pos - base;
        let p = base.as_ivec2();

        let n = (1.0 - w.x) * (1.0 - w.y) * self.normal(self.clamp_cell(p))
            + w.x * (1.0 - w.y) * self.normal(self.clamp_cell(p + IVec2::X))
            + (1.0 - w.x) * w.y * self.normal(self.clamp_cell(p + IVec2::Y))
            + w.x * w.y * self.normal(self.clamp_cell(p + IVec2::ONE));

        n.try_normalize().unwrap_or(DVec3::Y)
    }

    /// Releases lazily emptied segments from the top of a column.
    fn reap(&mut self, idx: usize) {
        while let Some(&top) = self.columns[idx].last() {
            if self.pool.segment(top).thickness > 0.0 {
                break;
            }
            self.columns[idx].pop();
            self.pool.unget(Some(top));
        }
    }

    fn mark_dirty(&mut self, idx: usize) {
        if !self.dirty[idx] {
            self.dirty[idx] = true;
            self.dirty_cells.push(idx);
        }
    }

    /// True if `cell` changed since the last [`Terrain::take_dirty`].
    pub fn is_dirty(&self, cell: IVec2) -> bool {
        self.dirty[self.index(cell)]
    }

    /// Drains the list of cells changed since the last call.
    pub fn take_dirty(&mut self) -> Vec<IVec2> {
        let cells: Vec<IVec2> = self.dirty_cells.iter().map(|&i| self.cell_of(i)).collect();
        for idx in self.dirty_cells.drain(..) {
            self.dirty[idx] = false;
        }
        cells
    }

    /// Places a pool segment on top of a column.
    ///
    /// `None` and non-positive segments are released. A segment matching the
    /// surface material is merged into it. Over an Air surface the segment is
    /// slid beneath the Air so the Air stays on top.
    pub fn add(&mut self, cell: IVec2, segment: Option<SegmentId>) {
        let Some(id) = segment else {
            return;
        };
        let idx = self.index(cell);
        if !(self.pool.segment(id).thickness > 0.0) {
            self.pool.unget(Some(id));
            return;
        }
        self.reap(idx);
        self.mark_dirty(idx);
        self.stack(idx, id);
    }

    fn stack(&mut self, idx: usize, id: SegmentId) {
        let Some(&top) = self.columns[idx].last() else {
            self.pool.segment_mut(id).floor = 0.0;
            self.columns[idx].push(id);
            return;
        };

        let current = *self.pool.segment(top);
        let incoming = *self.pool.segment(id);

        if current.soil == incoming.soil {
            let merged = current.thickness + incoming.thickness;
            let seg = self.pool.segment_mut(top);
            seg.saturation = (current.saturation * current.thickness
                + incoming.saturation * incoming.thickness)
                / merged;
            seg.thickness = merged;
            self.pool.unget(Some(id));
            return;
        }

        if current.soil == SoilType::AIR {
            self.columns[idx].pop();
            self.stack(idx, id);
            self.stack(idx, top);
            return;
        }

        self.pool.segment_mut(id).floor = current.ceiling();
        self.columns[idx].push(id);
    }

    /// Convenience for `add(cell, pool.get(thickness, soil))`.
    pub fn deposit(&mut self, cell: IVec2, thickness: f64, soil: SoilType) {
        if thickness > 0.0 {
            let seg = self.pool.get(thickness, soil);
            self.add(cell, seg);
        }
    }

    /// Removes up to `amount` from the top segment of a column.
    ///
    /// Returns the unsatisfied remainder: 0 when the top segment covered the
    /// request, `amount - available` when the top segment was used up, and
    /// `amount` for a bare column. Callers that need the whole amount loop on
    /// the remainder, see [`Terrain::remove_all`].
    pub fn remove(&mut self, cell: IVec2, amount: f64) -> f64 {
        if !(amount > 0.0) {
            return 0.0;
        }
        let idx = self.index(cell);
        self.reap(idx);
        let Some(&top) = self.columns[idx].last() else {
            return amount;
        };
        self.mark_dirty(idx);

        let seg = self.pool.segment_mut(top);
        let remainder = amount - seg.thickness;
        if remainder < 0.0 {
            seg.thickness -= amount;
            return 0.0;
        }

        seg.thickness = 0.0;
        if self.config.removal_policy == RemovalPolicy::Eager {
            self.columns[idx].pop();
            self.pool.unget(Some(top));
        }
        remainder
    }

    /// Removes `amount` across segment boundaries until satisfied or the
    /// column is bare. Returns the volume actually removed.
    pub fn remove_all(&mut self, cell: IVec2, amount: f64) -> f64 {
        if !(amount > 0.0) {
            return 0.0;
        }
        let idx = self.index(cell);
        let mut remainder = amount;
        let mut iterations = 0u32;
        while remainder > 0.0 && self.effective_top(idx).is_some() {
            if iterations >= self.config.max_remove_iterations {
                self.residue_events += 1;
                warn!(
                    cell = %cell,
                    requested = amount,
                    residue = remainder,
                    "remove loop hit its iteration cap, residue left in place"
                );
                break;
            }
            remainder = self.remove(cell, remainder);
            iterations += 1;
        }
        amount - remainder
    }

    /// How many remove loops were force-terminated.
    pub fn residue_count(&self) -> u64 {
        self.residue_events
    }

    /// Adds one full-grid layer of `soil` with per-cell thickness from `thickness`.
    pub fn push_layer<F>(&mut self, soil: SoilType, mut thickness: F)
    where
        F: FnMut(IVec2) -> f64,
    {
        for y in 0..self.depth as i32 {
            for x in 0..self.width as i32 {
                let cell = IVec2::new(x, y);
                let t = thickness(cell);
                self.deposit(cell, t, soil);
            }
        }
    }

    /// Summed thickness of every segment in the grid.
    pub fn total_volume(&self) -> f64 {
        self.columns
            .iter()
            .flatten()
            .map(|&id| self.pool.segment(id).thickness)
            .sum()
    }

    /// Summed thickness of all segments of `soil`.
    pub fn volume_of(&self, soil: SoilType) -> f64 {
        self.columns
            .iter()
            .flatten()
            .map(|&id| self.pool.segment(id))
            .filter(|s| s.soil == soil)
            .map(|s| s.thickness)
            .sum()
    }

    /// Surface heights in row-major order.
    pub fn heights(&self) -> Vec<f64> {
        (0..self.columns.len())
            .map(|idx| self.height(self.cell_of(idx)))
            .collect()
    }
}
