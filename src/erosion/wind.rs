//! Aeolian erosion particle.

use glam::{DVec2, DVec3, IVec2};
use rand::Rng;

use super::cascade::cascade;
use super::config::{AbrasionSource, CascadeConfig, WindConfig};
use crate::soil::{SoilTable, SoilType};
use crate::terrain::Terrain;

/// A parcel of wind that skims the surface, abrades material on contact and
/// drops it again while airborne.
#[derive(Debug, Clone)]
pub struct WindParticle {
    pub pos: DVec2,
    /// Velocity (x, up, z).
    pub speed: DVec3,
    /// Height of the particle above the datum.
    pub height: f64,
    /// Carried sediment.
    pub sediment: f64,
    /// Material the sediment is deposited as.
    pub carried: SoilType,

    cell: IVec2,
    normal: DVec3,
    surface: SoilType,
}

impl WindParticle {
    /// Creates a particle at `pos`; it carries what the surface abrades into.
    pub fn new(terrain: &Terrain, table: &SoilTable, pos: DVec2, config: &WindConfig) -> Self {
        let cell = Terrain::cell_at(pos);
        let surface = terrain.surface(cell);
        Self {
            pos,
            speed: config.prevailing,
            height: 0.0,
            sediment: 0.0,
            carried: table.param(surface).abrades,
            cell,
            normal: DVec3::Y,
            surface,
        }
    }

    /// Creates a particle on a uniformly random cell.
    pub fn spawn<R: Rng>(terrain: &Terrain, table: &SoilTable, rng: &mut R, config: &WindConfig) -> Self {
        let x = rng.gen_range(0..terrain.width()) as f64;
        let z = rng.gen_range(0..terrain.depth()) as f64;
        Self::new(terrain, table, DVec2::new(x, z), config)
    }

    /// True while the particle is above the terrain at its cell.
    pub fn airborne(&self, terrain: &Terrain) -> bool {
        self.height > terrain.height(self.cell)
    }

    /// Advances the particle one step.
    ///
    /// Returns false once it leaves the grid or slows below `min_speed`.
    pub fn move_step(&mut self, terrain: &Terrain, config: &WindConfig) -> bool {
        self.cell = Terrain::cell_at(self.pos);
        self.normal = terrain.normal(self.cell);
        self.surface = terrain.surface(self.cell);

        let ground = terrain.height(self.cell);
        if self.height < ground {
            self.height = ground;
        }

        if self.height > ground {
            self.speed.y -= config.gravity;
        } else {
            let tangent = self.speed.cross(self.normal).cross(self.normal);
            self.speed = self.speed.lerp(tangent, config.friction);
        }
        self.speed = self.speed.lerp(config.prevailing, config.dominance);

        self.pos += DVec2::new(self.speed.x, self.speed.z);
        self.height += self.speed.y;

        let limit = (terrain.dim() - IVec2::ONE).as_dvec2();
        if self.pos.x < 0.0 || self.pos.y < 0.0 || self.pos.x >= limit.x || self.pos.y >= limit.y {
            return false;
        }
        self.speed.length() >= config.min_speed
    }

    /// Abrades on contact, settles sediment while airborne.
    ///
    /// Returns false if the carried material is Air or cannot be suspended at all.
    pub fn interact(
        &mut self,
        terrain: &mut Terrain,
        table: &SoilTable,
        config: &WindConfig,
        cascade_config: &CascadeConfig,
    ) -> bool {
        let carried = *table.param(self.carried);
        if self.carried == SoilType::AIR || carried.suspension == 0.0 {
            return false;
        }

        let next = Terrain::cell_at(self.pos);
        if !terrain.in_bounds(next) {
            return false;
        }

        if self.height <= terrain.height_at(self.pos) {
            let surface = table.param(self.surface);
            if surface.abrades == self.carried {
                let suspension = match config.abrasion_source {
                    AbrasionSource::Surface => surface.suspension,
                    AbrasionSource::Carried => carried.suspension,
                };
                let deficit = terrain.height(next) - self.height;
                let force = self.speed.length() * deficit * (1.0 - self.sediment).max(0.0);
                self.sediment += terrain.remove_all(self.cell, suspension * force);
                cascade(terrain, table, self.cell, cascade_config.budget);
            }
        } else {
            let drop = carried.suspension * self.sediment;
            self.sediment -= drop;
            terrain.deposit(self.cell, 0.5 * drop, self.carried);
            terrain.deposit(next, 0.5 * drop, self.carried);
            cascade(terrain, table, self.cell, cascade_config.budget);
            cascade(terrain, table, next, cascade_config.budget);
        }
        true
    }

    /// Runs the particle until it stops; returns the number of steps taken.
    pub fn fly(
        &mut self,
        terrain: &mut Terrain,
        table: &SoilTable,
        config: &WindConfig,
        cascade_config: &CascadeConfig,
    ) -> u32 {
        let mut steps = 0;
        while steps < config.max_steps
            && self.move_step(terrain, config)
            && self.interact(terrain, table, config, cascade_config)
        {
            steps += 1;
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil::SoilProfile;
    use crate::terrain::TerrainConfig;

    fn table() -> SoilTable {
        SoilProfile::default().build_table().unwrap()
    }

    #[test]
    fn test_air_carrying_particle_is_inert() {
        let table = table();
        let config = WindConfig::default();
        let cascade_config = CascadeConfig::default();

        // Bare ground: the surface is Air, which abrades into Air.
        let mut terrain = Terrain::new(8, 8, TerrainConfig::default());
        let mut p = WindParticle::new(&terrain, &table, DVec2::new(4.0, 4.0), &config);
        assert_eq!(p.carried, SoilType::AIR);
        assert!(!p.interact(&mut terrain, &table, &config, &cascade_config));

        // Forcing Air onto a particle over real ground behaves the same.
        let rock = table.lookup("Rock").unwrap();
        terrain.push_layer(rock, |c| 0.3 + 0.01 * c.y as f64);
        let mut p = WindParticle::new(&terrain, &table, DVec2::new(4.0, 4.0), &config);
        p.carried = SoilType::AIR;
        p.sediment = 0.5;
        terrain.take_dirty();
        assert!(!p.interact(&mut terrain, &table, &config, &cascade_config));
        assert!(terrain.take_dirty().is_empty());
    }

    #[test]
    fn test_airborne_air_particle_deposits_nothing() {
        let table = table();
        let config = WindConfig::default();
        let mut terrain = Terrain::new(16, 16, TerrainConfig::default());

        let mut p = WindParticle::new(&terrain, &table, DVec2::new(10.0, 5.0), &config);
        p.carried = SoilType::AIR;
        p.height = 3.0;
        p.sediment = 0.5;
        assert!(p.move_step(&terrain, &config));
        assert!(p.airborne(&terrain));
        assert!(!p.interact(&mut terrain, &table, &config, &CascadeConfig::default()));
        assert_eq!(terrain.volume_of(SoilType::AIR), 0.0);
        assert_eq!(p.sediment, 0.5);
    }

    #[test]
    fn test_carried_material_is_abrasion_target() {
        let table = table();
        let rock = table.lookup("Rock").unwrap();
        let mut terrain = Terrain::new(4, 4, TerrainConfig::default());
        terrain.push_layer(rock, |_| 0.5);
        let p = WindParticle::new(&terrain, &table, DVec2::new(1.0, 1.0), &WindConfig::default());
        assert_eq!(p.carried, table.lookup("Sand").unwrap());
    }

    #[test]
    fn test_airborne_particle_falls() {
        let table = table();
        let config = WindConfig::default();
        let sand = table.lookup("Sand").unwrap();
        let mut terrain = Terrain::new(32, 32, TerrainConfig::default());
        terrain.push_layer(sand, |_| 0.2);

        let mut p = WindParticle::new(&terrain, &table, DVec2::new(20.0, 10.0), &config);
        p.height = 5.0;
        p.speed = DVec3::new(-2.0, 0.0, 1.0);
        assert!(p.move_step(&terrain, &config));
        assert!(p.speed.y < 0.0);
        assert!(p.height < 5.0);
        assert!(p.pos.x < 20.0 && p.pos.y > 10.0);
    }

    #[test]
    fn test_airborne_deposit_conserves_sediment() {
        let table = table();
        let config = WindConfig::default();
        let sand = table.lookup("Sand").unwrap();
        let mut terrain = Terrain::new(32, 32, TerrainConfig::default());
        terrain.push_layer(sand, |_| 0.2);

        let mut p = WindParticle::new(&terrain, &table, DVec2::new(20.0, 10.0), &config);
        p.height = 5.0;
        p.sediment = 0.4;
        assert!(p.move_step(&terrain, &config));
        let before = terrain.total_volume() + p.sediment;
        assert!(p.interact(&mut terrain, &table, &config, &CascadeConfig::default()));
        assert!(p.sediment < 0.4);
        assert!((terrain.total_volume() + p.sediment - before).abs() < 1e-9);
    }

    #[test]
    fn test_contact_against_rising_ground_abrades() {
        let table = table();
        let config = WindConfig::default();
        let sand = table.lookup("Sand").unwrap();
        let mut terrain = Terrain::new(32, 32, TerrainConfig::default());
        // Ground rises toward -x, the direction the wind blows.
        terrain.push_layer(sand, |c| 1.0 - 0.02 * c.x as f64);

        let mut p = WindParticle::new(&terrain, &table, DVec2::new(20.0, 10.0), &config);
        assert_eq!(p.carried, sand);
        let before = terrain.total_volume();
        assert!(p.move_step(&terrain, &config));
        assert!(p.interact(&mut terrain, &table, &config, &CascadeConfig::default()));
        assert!(p.sediment > 0.0);
        assert!((before - terrain.total_volume() - p.sediment).abs() < 1e-9);
    }

    #[test]
    fn test_fly_terminates() {
        let table = table();
        let config = WindConfig::default();
        let sand = table.lookup("Sand").unwrap();
        let mut terrain = Terrain::new(32, 32, TerrainConfig::default());
        terrain.push_layer(sand, |c| 0.2 + 0.05 * ((c.x as f64) * 0.7).sin());

        let mut p = WindParticle::new(&terrain, &table, DVec2::new(30.0, 2.0), &config);
        let steps = p.fly(&mut terrain, &table, &config, &CascadeConfig::default());
        assert!(steps < config.max_steps);
        assert!(terrain.heights().iter().all(|&h| h >= 0.0));
    }
}
