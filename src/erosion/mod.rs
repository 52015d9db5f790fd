//! Particle erosion over layered terrain.
//!
//! Water particles flow downhill trading sediment with the surface and pool in
//! depressions; wind particles abrade and redeposit; a thermal cascade keeps
//! slopes below each material's limit; seepage moves pore water through the
//! strata between ticks.

mod cascade;
mod config;
mod flood;
mod seep;
mod water;
mod wind;

pub use cascade::{cascade, CascadeStats};
pub use config::{
    AbrasionSource, CascadeConfig, ErosionConfig, FrequencyGate, SeepConfig, WaterConfig, WindConfig,
};
pub use flood::{flood_basin, FloodOutcome, FloodReport};
pub use seep::{pore_water, seep, SeepStats};
pub use water::{Descent, WaterParticle};
pub use wind::WindParticle;
