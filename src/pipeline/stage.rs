//! Tick stages and the simulation driver.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::erosion::{
    seep, CascadeConfig, ErosionConfig, SeepConfig, SeepStats, WaterConfig, WaterParticle, WindConfig,
    WindParticle,
};
use crate::noise::build_strata;
use crate::soil::{SoilProfile, SoilTable, SoilTableError};
use crate::terrain::{Terrain, TerrainConfig};

/// Unique identifier for tick stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    /// Water particles.
    Hydraulic,
    /// Wind particles.
    Aeolian,
    /// Pore water pass.
    Seepage,
}

impl StageId {
    /// Returns the name of the stage.
    pub fn name(&self) -> &'static str {
        match self {
            StageId::Hydraulic => "hydraulic",
            StageId::Aeolian => "aeolian",
            StageId::Seepage => "seepage",
        }
    }
}

/// Errors that can occur while building or running a simulation.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Grid must have at least one cell, got {0}x{1}")]
    EmptyGrid(usize, usize),
    #[error(transparent)]
    Soil(#[from] SoilTableError),
}

/// Mutable state a stage works on during one tick.
pub struct TickContext<'a> {
    pub terrain: &'a mut Terrain,
    pub table: &'a SoilTable,
    pub rng: &'a mut ChaCha8Rng,
    /// One-based tick number.
    pub tick: u64,
}

/// Counters gathered over one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickStats {
    pub tick: u64,
    pub water_particles: usize,
    pub water_steps: u64,
    pub floods: u64,
    pub drains: u64,
    pub wind_particles: usize,
    pub wind_steps: u64,
    /// Set on ticks where the seepage stage ran.
    pub seep: Option<SeepStats>,
    /// Pool allocations that failed so far.
    pub pool_exhausted: u64,
    /// Removal loops cut off by the iteration cap so far.
    pub residue: u64,
}

/// A stage of the per-tick erosion loop.
pub trait TickStage: Send + Sync {
    /// Returns the unique identifier for this stage.
    fn id(&self) -> StageId;

    /// Returns a human-readable name for the stage.
    fn name(&self) -> &str;

    /// Whether the stage runs on the given one-based tick.
    fn runs_on(&self, _tick: u64) -> bool {
        true
    }

    /// Executes the stage, adding its counters to `stats`.
    fn execute(&self, ctx: &mut TickContext<'_>, stats: &mut TickStats) -> Result<(), SimulationError>;
}

/// Drops water particles on random cells and runs each to completion.
pub struct HydraulicStage {
    pub particles: usize,
    pub water: WaterConfig,
    pub cascade: CascadeConfig,
}

impl TickStage for HydraulicStage {
    fn id(&self) -> StageId {
        StageId::Hydraulic
    }

    fn name(&self) -> &str {
        "Hydraulic Erosion"
    }

    fn execute(&self, ctx: &mut TickContext<'_>, stats: &mut TickStats) -> Result<(), SimulationError> {
        for _ in 0..self.particles {
            let mut particle = WaterParticle::spawn(ctx.terrain, ctx.table, ctx.rng, &self.water);
            let descent = particle.descend(ctx.terrain, ctx.table, &self.water, &self.cascade);
            stats.water_steps += descent.steps as u64;
            stats.floods += descent.floods as u64;
            stats.drains += descent.drains as u64;
        }
        stats.water_particles += self.particles;
        Ok(())
    }
}

/// Releases wind particles on random cells and flies each until it stops.
pub struct AeolianStage {
    pub particles: usize,
    pub wind: WindConfig,
    pub cascade: CascadeConfig,
}

impl TickStage for AeolianStage {
    fn id(&self) -> StageId {
        StageId::Aeolian
    }

    fn name(&self) -> &str {
        "Aeolian Erosion"
    }

    fn execute(&self, ctx: &mut TickContext<'_>, stats: &mut TickStats) -> Result<(), SimulationError> {
        for _ in 0..self.particles {
            let mut particle = WindParticle::spawn(ctx.terrain, ctx.table, ctx.rng, &self.wind);
            stats.wind_steps += particle.fly(ctx.terrain, ctx.table, &self.wind, &self.cascade) as u64;
        }
        stats.wind_particles += self.particles;
        Ok(())
    }
}

/// Whole-grid seepage, every `interval` ticks.
pub struct SeepageStage {
    /// Zero disables the stage.
    pub interval: u64,
    pub seep: SeepConfig,
}

impl TickStage for SeepageStage {
    fn id(&self) -> StageId {
        StageId::Seepage
    }

    fn name(&self) -> &str {
        "Seepage"
    }

    fn runs_on(&self, tick: u64) -> bool {
        self.interval > 0 && tick % self.interval == 0
    }

    fn execute(&self, ctx: &mut TickContext<'_>, stats: &mut TickStats) -> Result<(), SimulationError> {
        stats.seep = Some(seep(ctx.terrain, ctx.table, &self.seep));
        Ok(())
    }
}

/// Everything needed to set up a [`Simulation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub width: usize,
    pub depth: usize,
    pub seed: u64,
    /// Water particles per tick.
    pub water_per_tick: usize,
    /// Wind particles per tick.
    pub wind_per_tick: usize,
    /// Ticks between seepage passes; zero disables seepage.
    pub seep_interval: u64,
    pub terrain: TerrainConfig,
    pub erosion: ErosionConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 512,
            depth: 512,
            seed: 0,
            water_per_tick: 1500,
            wind_per_tick: 500,
            seep_interval: 10,
            terrain: TerrainConfig::default(),
            erosion: ErosionConfig::default(),
        }
    }
}

/// A layered terrain plus the stages that erode it, advanced tick by tick.
pub struct Simulation {
    terrain: Terrain,
    table: SoilTable,
    rng: ChaCha8Rng,
    stages: Vec<Box<dyn TickStage>>,
    tick: u64,
}

impl Simulation {
    /// Creates a simulation over an empty grid with the stages `config` describes.
    pub fn new(config: &SimulationConfig, table: SoilTable) -> Result<Self, SimulationError> {
        if config.width == 0 || config.depth == 0 {
            return Err(SimulationError::EmptyGrid(config.width, config.depth));
        }

        let erosion = &config.erosion;
        let mut sim = Self {
            terrain: Terrain::new(config.width, config.depth, config.terrain.clone()),
            table,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            stages: Vec::new(),
            tick: 0,
        };
        sim.add_stage(HydraulicStage {
            particles: config.water_per_tick,
            water: erosion.water.clone(),
            cascade: erosion.cascade,
        })
        .add_stage(AeolianStage {
            particles: config.wind_per_tick,
            wind: erosion.wind.clone(),
            cascade: erosion.cascade,
        })
        .add_stage(SeepageStage {
            interval: config.seep_interval,
            seep: erosion.seep.clone(),
        });
        Ok(sim)
    }

    /// Builds the soil table from `profile` and seeds the grid with its layers.
    pub fn from_profile(config: &SimulationConfig, profile: &SoilProfile) -> Result<Self, SimulationError> {
        let table = profile.build_table()?;
        let mut sim = Self::new(config, table)?;
        build_strata(&mut sim.terrain, &sim.table, &profile.layers, config.seed as u32)?;
        // Seeding is not erosion; start with a clean dirty list.
        sim.terrain.take_dirty();
        Ok(sim)
    }

    /// Appends a stage to the tick loop.
    pub fn add_stage<S: TickStage + 'static>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Drops every stage.
    pub fn clear_stages(&mut self) -> &mut Self {
        self.stages.clear();
        self
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn terrain_mut(&mut self) -> &mut Terrain {
        &mut self.terrain
    }

    pub fn table(&self) -> &SoilTable {
        &self.table
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Runs every stage due this tick, then decays the traffic field.
    pub fn tick(&mut self) -> Result<TickStats, SimulationError> {
        self.tick_with(|_, _, _| {}, |_, _, _| {})
    }

    fn tick_with<F1, F2>(&mut self, mut on_stage_start: F1, mut on_stage_complete: F2) -> Result<TickStats, SimulationError>
    where
        F1: FnMut(&str, usize, usize),
        F2: FnMut(&str, usize, usize),
    {
        self.tick += 1;
        let mut stats = TickStats {
            tick: self.tick,
            ..Default::default()
        };

        let mut ctx = TickContext {
            terrain: &mut self.terrain,
            table: &self.table,
            rng: &mut self.rng,
            tick: self.tick,
        };
        let total = self.stages.len();
        for (i, stage) in self.stages.iter().enumerate() {
            if !stage.runs_on(ctx.tick) {
                continue;
            }
            on_stage_start(stage.name(), i, total);
            stage.execute(&mut ctx, &mut stats)?;
            on_stage_complete(stage.name(), i, total);
        }

        self.terrain.end_tick();
        stats.pool_exhausted = self.terrain.pool().exhausted_count();
        stats.residue = self.terrain.residue_count();

        debug!(
            tick = stats.tick,
            water_steps = stats.water_steps,
            floods = stats.floods,
            wind_steps = stats.wind_steps,
            seeped = stats.seep.is_some(),
            "tick complete"
        );
        Ok(stats)
    }

    /// Runs `ticks` ticks and returns the stats of each.
    pub fn run(&mut self, ticks: u64) -> Result<Vec<TickStats>, SimulationError> {
        (0..ticks).map(|_| self.tick()).collect()
    }

    /// Runs `ticks` ticks with progress callbacks.
    ///
    /// # Arguments
    /// * `on_stage_start` - Called with stage name, index and count before each stage
    /// * `on_tick_complete` - Called with the stats of each finished tick and the total
    pub fn run_with_callbacks<F1, F2>(
        &mut self,
        ticks: u64,
        mut on_stage_start: F1,
        mut on_tick_complete: F2,
    ) -> Result<Vec<TickStats>, SimulationError>
    where
        F1: FnMut(&str, usize, usize),
        F2: FnMut(&TickStats, u64),
    {
        let mut all = Vec::with_capacity(ticks as usize);
        for _ in 0..ticks {
            let stats = self.tick_with(&mut on_stage_start, |_, _, _| {})?;
            on_tick_complete(&stats, ticks);
            all.push(stats);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil::SoilType;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            width: 32,
            depth: 32,
            seed: 7,
            water_per_tick: 20,
            wind_per_tick: 10,
            seep_interval: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_stage_id_name() {
        assert_eq!(StageId::Hydraulic.name(), "hydraulic");
        assert_eq!(StageId::Seepage.name(), "seepage");
    }

    #[test]
    fn test_partial_config_json_fills_defaults() {
        let json = r#"{
            "width": 64,
            "terrain": { "traffic": { "saturation": 30.0 } },
            "erosion": { "water": { "volume": 2.0 }, "cascade": {} }
        }"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        let defaults = SimulationConfig::default();

        assert_eq!(config.width, 64);
        assert_eq!(config.depth, defaults.depth);
        assert_eq!(config.erosion.water.volume, 2.0);
        assert_eq!(config.erosion.water.min_volume, defaults.erosion.water.min_volume);
        assert_eq!(config.erosion.wind.gravity, defaults.erosion.wind.gravity);
        assert_eq!(config.erosion.cascade.budget, defaults.erosion.cascade.budget);
        assert_eq!(config.terrain.traffic.saturation, 30.0);
        assert_eq!(config.terrain.traffic.learn_rate, defaults.terrain.traffic.learn_rate);
        assert_eq!(config.terrain.avg_layers, defaults.terrain.avg_layers);
    }

    #[test]
    fn test_empty_grid_is_rejected() {
        let config = SimulationConfig {
            width: 0,
            ..small_config()
        };
        let table = SoilProfile::default().build_table().unwrap();
        assert!(matches!(
            Simulation::new(&config, table),
            Err(SimulationError::EmptyGrid(0, 32))
        ));
    }

    #[test]
    fn test_from_profile_seeds_layers() {
        let mut sim = Simulation::from_profile(&small_config(), &SoilProfile::default()).unwrap();
        assert_eq!(sim.stage_count(), 3);
        assert_eq!(sim.ticks(), 0);
        assert!(sim.terrain().heights().iter().any(|&h| h > 0.0));
        assert!(sim.terrain_mut().take_dirty().is_empty());
    }

    #[test]
    fn test_seepage_runs_on_interval() {
        let mut sim = Simulation::from_profile(&small_config(), &SoilProfile::default()).unwrap();
        let stats = sim.run(4).unwrap();
        let seeped: Vec<u64> = stats.iter().filter(|s| s.seep.is_some()).map(|s| s.tick).collect();
        assert_eq!(seeped, vec![2, 4]);
        assert!(stats.iter().all(|s| s.water_particles == 20 && s.wind_particles == 10));
    }

    #[test]
    fn test_ticks_keep_heights_valid() {
        let mut sim = Simulation::from_profile(&small_config(), &SoilProfile::default()).unwrap();
        sim.run(3).unwrap();
        assert_eq!(sim.ticks(), 3);
        assert!(sim.terrain().heights().iter().all(|&h| h.is_finite() && h >= 0.0));
        assert!(sim.terrain().volume_of(SoilType::AIR) >= 0.0);
    }

    #[test]
    fn test_same_seed_same_terrain() {
        let mut a = Simulation::from_profile(&small_config(), &SoilProfile::default()).unwrap();
        let mut b = Simulation::from_profile(&small_config(), &SoilProfile::default()).unwrap();
        a.run(2).unwrap();
        b.run(2).unwrap();
        assert_eq!(a.terrain().heights(), b.terrain().heights());
    }

    #[test]
    fn test_run_with_callbacks() {
        let mut sim = Simulation::from_profile(&small_config(), &SoilProfile::default()).unwrap();
        let mut started = Vec::new();
        let mut completed = 0;

        sim.run_with_callbacks(
            2,
            |name, _, total| {
                assert_eq!(total, 3);
                started.push(name.to_string());
            },
            |stats, total| {
                assert_eq!(total, 2);
                completed += 1;
                assert_eq!(stats.tick, completed);
            },
        )
        .unwrap();

        assert_eq!(completed, 2);
        assert_eq!(
            started,
            vec!["Hydraulic Erosion", "Aeolian Erosion", "Hydraulic Erosion", "Aeolian Erosion", "Seepage"]
        );
    }

    #[test]
    fn test_custom_stage_list() {
        let mut sim = Simulation::from_profile(&small_config(), &SoilProfile::default()).unwrap();
        sim.clear_stages().add_stage(SeepageStage {
            interval: 1,
            seep: SeepConfig::default(),
        });
        let stats = sim.tick().unwrap();
        assert_eq!(stats.water_particles, 0);
        assert!(stats.seep.is_some());
    }
}
