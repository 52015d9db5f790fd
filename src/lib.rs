//! Layered terrain erosion.
//!
//! Terrain is a grid of run-length encoded soil columns. Water and wind
//! particles move material between them, slopes collapse past each soil's
//! angle of repose, and pore water seeps through the stack.

pub mod erosion;
pub mod export;
pub mod noise;
pub mod pipeline;
pub mod soil;
pub mod terrain;

pub use erosion::{ErosionConfig, WaterParticle, WindParticle};
pub use export::RasterSnapshot;
pub use pipeline::{Simulation, SimulationConfig, TickStage, TickStats};
pub use soil::{SoilProfile, SoilTable, SoilType};
pub use terrain::{Terrain, TerrainConfig};
