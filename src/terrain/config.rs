//! Terrain storage configuration.

use serde::{Deserialize, Serialize};

/// What happens to a top segment whose thickness is used up by `remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalPolicy {
    /// Pop and release the segment in the same call.
    Eager,
    /// Leave it on the column with zero thickness; the next mutation of the
    /// column releases it.
    Lazy,
}

impl Default for RemovalPolicy {
    fn default() -> Self {
        Self::Eager
    }
}

/// Parameters of the per-cell traffic field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Blend factor of the per-tick track into the frequency (0-1).
    pub learn_rate: f32,
    /// Saturation constant K in `K*t / (1 + K*t)`.
    pub saturation: f32,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            learn_rate: 0.05,
            saturation: 15.0,
        }
    }
}

/// Parameters for [`Terrain`](super::Terrain) construction and mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Average segments per column used to size the material pool.
    pub avg_layers: usize,
    /// Vertical exaggeration applied to heights when computing normals.
    pub vertical_scale: f64,
    /// Over-removal behaviour of `remove`.
    pub removal_policy: RemovalPolicy,
    /// Safety cap on iterations of the remove-remainder loop.
    pub max_remove_iterations: u32,
    /// Traffic field decay parameters.
    pub traffic: TrafficConfig,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            avg_layers: 12,
            vertical_scale: 80.0,
            removal_policy: RemovalPolicy::default(),
            max_remove_iterations: 1024,
            traffic: TrafficConfig::default(),
        }
    }
}
