//! Hydraulic erosion particle.

use glam::{DVec2, DVec3, IVec2};
use rand::Rng;

use super::cascade::cascade;
use super::config::{CascadeConfig, WaterConfig};
use super::flood::{flood_basin, FloodOutcome};
use crate::soil::{SoilParam, SoilTable, SoilType};
use crate::terrain::Terrain;

/// Counters for one particle's life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Descent {
    /// Successful move/interact steps.
    pub steps: u32,
    /// Flood passes run.
    pub floods: u32,
    /// Floods that found a drain and resumed flow.
    pub drains: u32,
}

/// A drop of water that flows downhill, trading sediment with the surface,
/// and pools in depressions when it stalls.
#[derive(Debug, Clone)]
pub struct WaterParticle {
    pub pos: DVec2,
    pub speed: DVec2,
    pub volume: f64,
    /// Carried sediment concentration.
    pub sediment: f64,
    /// Material the sediment is deposited as.
    pub carried: SoilType,

    cell: IVec2,
    normal: DVec3,
    surface: SoilType,
    param: SoilParam,
    evaporation: f64,
    spill: u32,
}

impl WaterParticle {
    /// Creates a particle at `pos`; the carried material is what the surface
    /// there transports.
    pub fn new(terrain: &Terrain, table: &SoilTable, pos: DVec2, config: &WaterConfig) -> Self {
        let cell = Terrain::cell_at(pos);
        let surface = terrain.surface(cell);
        let param = *table.param(surface);
        Self {
            pos,
            speed: DVec2::ZERO,
            volume: config.volume,
            sediment: 0.0,
            carried: param.transports,
            cell,
            normal: DVec3::Y,
            surface,
            param,
            evaporation: config.evaporation,
            spill: config.spill,
        }
    }

    /// Creates a particle on a uniformly random cell.
    pub fn spawn<R: Rng>(terrain: &Terrain, table: &SoilTable, rng: &mut R, config: &WaterConfig) -> Self {
        let x = rng.gen_range(0..terrain.width()) as f64;
        let z = rng.gen_range(0..terrain.depth()) as f64;
        Self::new(terrain, table, DVec2::new(x, z), config)
    }

    /// Cell the particle last sampled.
    pub fn cell(&self) -> IVec2 {
        self.cell
    }

    /// Samples the surface at the current position and takes one step downhill.
    ///
    /// Returns false when the particle stalls (fluid surface or no slope) or
    /// leaves the grid; leaving zeroes the volume.
    pub fn move_step(&mut self, terrain: &mut Terrain, table: &SoilTable, config: &WaterConfig) -> bool {
        self.cell = Terrain::cell_at(self.pos);
        self.normal = terrain.normal(self.cell);
        self.surface = terrain.surface(self.cell);
        self.param = *table.param(self.surface);

        let idx = terrain.index(self.cell);
        terrain.traffic_mut().record(idx, self.volume as f32);
        let frequency = terrain.traffic().frequency(idx) as f64;

        if config.frequency_gate.friction() {
            self.param.friction *= 1.0 - frequency;
        }
        self.evaporation = if config.frequency_gate.evaporation() {
            config.evaporation * (1.0 - config.evaporation_damping * frequency)
        } else {
            config.evaporation
        };

        if self.surface.is_fluid() {
            return false;
        }

        let downhill = DVec2::new(self.normal.x, self.normal.z);
        if (downhill * self.param.friction).length() < config.motion_epsilon {
            return false;
        }

        let Some(direction) = downhill.lerp(self.speed, self.param.friction).try_normalize() else {
            return false;
        };
        self.speed = direction * config.step_length;
        self.pos += self.speed;

        let limit = (terrain.dim() - IVec2::ONE).as_dvec2();
        if self.pos.x < 0.0 || self.pos.y < 0.0 || self.pos.x >= limit.x || self.pos.y >= limit.y {
            self.volume = 0.0;
            return false;
        }
        true
    }

    /// Exchanges sediment with the cell left by the last step, then evaporates.
    ///
    /// Returns false once the volume falls to `min_volume`.
    pub fn interact(
        &mut self,
        terrain: &mut Terrain,
        table: &SoilTable,
        config: &WaterConfig,
        cascade_config: &CascadeConfig,
    ) -> bool {
        let slope = DVec2::new(self.normal.x, self.normal.z).length();
        let drop = terrain.height(self.cell) - terrain.height_at(self.pos);
        let c_eq = (self.param.solubility * slope * drop).max(0.0);
        let cdiff = c_eq - self.sediment;

        let frequency = terrain.traffic().frequency(terrain.index(self.cell)) as f64;
        let carried = table.param(self.carried);
        if carried.erosion_rate < frequency {
            self.carried = carried.erodes;
        }

        if cdiff < 0.0 {
            let amount = self.param.equilibrium_rate * -cdiff;
            terrain.deposit(self.cell, amount, self.carried);
            self.sediment = (self.sediment - amount).max(0.0);
        } else if cdiff > 0.0 {
            let removed = terrain.remove_all(self.cell, self.param.equilibrium_rate * cdiff);
            self.sediment += removed;
        }

        cascade(terrain, table, self.cell, cascade_config.budget);

        self.sediment /= 1.0 - self.evaporation;
        self.volume *= 1.0 - self.evaporation;
        self.volume > config.min_volume
    }

    /// Pools the remaining volume around the current cell.
    ///
    /// Returns true if the pool spilled into a drain and the particle moved
    /// there to keep flowing.
    pub fn flood(&mut self, terrain: &mut Terrain, config: &WaterConfig) -> bool {
        if self.volume < config.min_volume || self.spill == 0 {
            return false;
        }
        self.spill -= 1;

        let start = Terrain::cell_at(self.pos);
        if !terrain.in_bounds(start) {
            return false;
        }

        let report = flood_basin(terrain, start, self.volume, config);
        match report.outcome {
            FloodOutcome::Drained { drain } => {
                let previous = self.volume;
                self.volume = report.volume;
                if self.volume > 0.0 {
                    self.sediment *= previous / self.volume;
                }
                self.pos = drain.as_dvec2();
                self.speed = DVec2::ZERO;
                true
            }
            FloodOutcome::Exhausted | FloodOutcome::Sealed => {
                self.volume = report.volume;
                false
            }
        }
    }

    /// Runs the particle to completion: flow until it stalls, pool, and flow
    /// on from the drain while floods keep spilling.
    pub fn descend(
        &mut self,
        terrain: &mut Terrain,
        table: &SoilTable,
        config: &WaterConfig,
        cascade_config: &CascadeConfig,
    ) -> Descent {
        let mut descent = Descent::default();
        loop {
            let mut steps = 0;
            while steps < config.max_steps
                && self.move_step(terrain, table, config)
                && self.interact(terrain, table, config, cascade_config)
            {
                steps += 1;
            }
            descent.steps += steps;

            if self.volume < config.min_volume || self.spill == 0 {
                break;
            }
            descent.floods += 1;
            if !self.flood(terrain, config) {
                break;
            }
            descent.drains += 1;
        }
        descent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil::SoilProfile;
    use crate::terrain::TerrainConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn table() -> SoilTable {
        SoilProfile::default().build_table().unwrap()
    }

    #[test]
    fn test_carried_material_follows_surface() {
        let table = table();
        let rock = table.lookup("Rock").unwrap();
        let mut terrain = Terrain::new(4, 4, TerrainConfig::default());
        terrain.push_layer(rock, |_| 0.2);
        let p = WaterParticle::new(&terrain, &table, DVec2::new(1.0, 1.0), &WaterConfig::default());
        assert_eq!(p.carried, table.param(rock).transports);
        assert_eq!(p.volume, 1.0);
    }

    #[test]
    fn test_flat_terrain_stalls_then_pools() {
        let table = table();
        let rock = table.lookup("Rock").unwrap();
        let config = WaterConfig::default();
        let mut terrain = Terrain::new(256, 256, TerrainConfig::default());
        terrain.push_layer(rock, |_| 0.2);

        let mut p = WaterParticle::new(&terrain, &table, DVec2::new(128.0, 128.0), &config);
        assert!(!p.move_step(&mut terrain, &table, &config));
        assert_eq!(p.volume, 1.0);

        assert!(!p.flood(&mut terrain, &config));
        let water = terrain.volume_of(SoilType::WATER);
        assert!(water > 0.0);
        assert!((water - config.volume * config.volume_factor).abs() < 1e-6);
        assert_eq!(terrain.surface(IVec2::new(128, 128)), SoilType::WATER);
    }

    #[test]
    fn test_move_records_traffic() {
        let table = table();
        let rock = table.lookup("Rock").unwrap();
        let config = WaterConfig::default();
        let mut terrain = Terrain::new(8, 8, TerrainConfig::default());
        terrain.push_layer(rock, |c| 1.0 - 0.05 * c.x as f64);

        let mut p = WaterParticle::new(&terrain, &table, DVec2::new(2.0, 4.0), &config);
        assert!(p.move_step(&mut terrain, &table, &config));
        assert!(p.pos.x > 2.0);
        assert!((p.speed.length() - config.step_length).abs() < 1e-9);
        let idx = terrain.index(IVec2::new(2, 4));
        assert_eq!(terrain.traffic().track(idx), 1.0);
    }

    #[test]
    fn test_leaving_the_grid_zeroes_volume() {
        let table = table();
        let rock = table.lookup("Rock").unwrap();
        let config = WaterConfig::default();
        let mut terrain = Terrain::new(8, 8, TerrainConfig::default());
        terrain.push_layer(rock, |c| 1.0 - 0.05 * c.x as f64);

        let mut p = WaterParticle::new(&terrain, &table, DVec2::new(6.0, 4.0), &config);
        assert!(!p.move_step(&mut terrain, &table, &config));
        assert_eq!(p.volume, 0.0);
        assert!(!p.flood(&mut terrain, &config));
    }

    #[test]
    fn test_water_surface_stops_particle() {
        let table = table();
        let rock = table.lookup("Rock").unwrap();
        let config = WaterConfig::default();
        let mut terrain = Terrain::new(8, 8, TerrainConfig::default());
        terrain.push_layer(rock, |c| 1.0 - 0.05 * c.x as f64);
        terrain.deposit(IVec2::new(3, 3), 0.1, SoilType::WATER);

        let mut p = WaterParticle::new(&terrain, &table, DVec2::new(3.0, 3.0), &config);
        assert!(!p.move_step(&mut terrain, &table, &config));
    }

    #[test]
    fn test_interact_erodes_on_steep_drop() {
        let table = table();
        let sand = table.lookup("Sand").unwrap();
        let rock = table.lookup("Rock").unwrap();
        let config = WaterConfig::default();
        let mut terrain = Terrain::new(8, 8, TerrainConfig::default());
        terrain.push_layer(rock, |_| 0.5);
        terrain.push_layer(sand, |c| 0.5 - 0.04 * c.x as f64);

        let mut p = WaterParticle::new(&terrain, &table, DVec2::new(2.0, 4.0), &config);
        let before = terrain.total_volume();
        assert!(p.move_step(&mut terrain, &table, &config));
        assert!(p.interact(&mut terrain, &table, &config, &CascadeConfig::default()));
        assert!(p.sediment > 0.0);
        assert!(p.volume < 1.0);

        // Whatever left the terrain is now carried (before evaporation scaling).
        let taken = before - terrain.total_volume();
        assert!(taken > 0.0);
        assert!((taken - p.sediment * (1.0 - p.evaporation)).abs() < 1e-9);
    }

    #[test]
    fn test_descend_terminates_and_keeps_heights_valid() {
        let table = table();
        let rock = table.lookup("Rock").unwrap();
        let soil = table.lookup("Soil").unwrap();
        let config = WaterConfig::default();
        let mut terrain = Terrain::new(32, 32, TerrainConfig::default());
        terrain.push_layer(rock, |c| {
            let d = (c.as_dvec2() - DVec2::splat(16.0)).length();
            0.2 + 0.01 * d
        });
        terrain.push_layer(soil, |_| 0.05);

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let mut p = WaterParticle::spawn(&terrain, &table, &mut rng, &config);
            let descent = p.descend(&mut terrain, &table, &config, &CascadeConfig::default());
            assert!(descent.floods <= config.spill);
            assert!(descent.drains <= descent.floods);
            // A particle that still had water when it stopped flowing pooled it.
            assert!(p.volume <= config.min_volume || descent.floods > 0);
        }
        assert!(terrain.heights().iter().all(|&h| h >= 0.0));
    }
}
