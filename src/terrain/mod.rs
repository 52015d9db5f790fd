//! Layered terrain storage.
//!
//! Provides the [`Terrain`] grid of run-length encoded material columns, the
//! [`MaterialPool`] its segments live in, and the per-cell [`TrafficField`].

mod config;
mod layermap;
mod pool;
mod traffic;

pub use config::{RemovalPolicy, TerrainConfig, TrafficConfig};
pub use layermap::Terrain;
pub use pool::{MaterialPool, Segment, SegmentId};
pub use traffic::TrafficField;
