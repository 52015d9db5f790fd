//! Simulation loop.
//!
//! Erosion processes are [`TickStage`] trait objects run in order every tick
//! by a [`Simulation`], which owns the terrain, the soil table and the seeded
//! random source.

mod stage;

pub use stage::{
    AeolianStage, HydraulicStage, SeepageStage, Simulation, SimulationConfig, SimulationError, StageId,
    TickContext, TickStage, TickStats,
};
