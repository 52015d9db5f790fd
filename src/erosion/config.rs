//! Erosion configuration.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Which particle parameters the cell traffic frequency modulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrequencyGate {
    /// Traffic has no effect on the particle.
    None,
    /// Busy cells lower surface friction.
    Friction,
    /// Busy cells lower the evaporation rate.
    Evaporation,
    /// Both of the above.
    Both,
}

impl FrequencyGate {
    pub fn friction(self) -> bool {
        matches!(self, Self::Friction | Self::Both)
    }

    pub fn evaporation(self) -> bool {
        matches!(self, Self::Evaporation | Self::Both)
    }
}

impl Default for FrequencyGate {
    fn default() -> Self {
        Self::Both
    }
}

/// Where wind abrasion takes its suspension rate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbrasionSource {
    /// The material being abraded.
    Surface,
    /// The material the particle already carries.
    Carried,
}

impl Default for AbrasionSource {
    fn default() -> Self {
        Self::Surface
    }
}

/// Slope-limiting redistribution triggered by particles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// How many chained re-cascades one particle interaction may trigger.
    pub budget: u32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self { budget: 0 }
    }
}

/// Parameters for hydraulic erosion particles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterConfig {
    /// Initial particle volume.
    pub volume: f64,
    /// Particles at or below this volume stop.
    pub min_volume: f64,
    /// Conversion from particle volume to standing water thickness.
    pub volume_factor: f64,
    /// Number of flood passes one particle may run.
    pub spill: u32,
    /// Base evaporation rate per step (0-1).
    pub evaporation: f64,
    /// How strongly traffic frequency damps evaporation.
    pub evaporation_damping: f64,
    /// Horizontal distance travelled per step.
    pub step_length: f64,
    /// Minimum friction-scaled slope that still moves a particle.
    pub motion_epsilon: f64,
    /// Height tolerance when classifying cells against the flood plane.
    pub plane_epsilon: f64,
    /// Traffic feedback policy.
    pub frequency_gate: FrequencyGate,
    /// Upper bound on move/interact steps between two floods.
    pub max_steps: u32,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            min_volume: 0.01,
            volume_factor: 0.5,
            spill: 3,
            evaporation: 0.005,
            evaporation_damping: 0.2,
            step_length: std::f64::consts::SQRT_2,
            motion_epsilon: 1e-6,
            plane_epsilon: 1e-9,
            frequency_gate: FrequencyGate::default(),
            max_steps: 4096,
        }
    }
}

/// Parameters for aeolian erosion particles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindConfig {
    /// Prevailing wind velocity (x, up, z).
    pub prevailing: DVec3,
    /// Vertical acceleration while airborne.
    pub gravity: f64,
    /// Blend factor toward the prevailing wind per step (0-1).
    pub dominance: f64,
    /// Blend factor toward the surface-tangent velocity on contact (0-1).
    pub friction: f64,
    /// Particles slower than this stop.
    pub min_speed: f64,
    /// Suspension rate used when abrading.
    pub abrasion_source: AbrasionSource,
    /// Upper bound on steps per particle.
    pub max_steps: u32,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            prevailing: DVec3::new(-2.0, 0.0, 1.0),
            gravity: 0.1,
            dominance: 0.2,
            friction: 0.8,
            min_speed: 0.01,
            abrasion_source: AbrasionSource::default(),
            max_steps: 4096,
        }
    }
}

/// Parameters for the whole-grid seepage pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeepConfig {
    /// Fraction of the possible flow from standing water into the ground per pass.
    pub infiltration_rate: f64,
    /// Fraction of the possible flow between stacked segments per pass.
    pub percolation_rate: f64,
    /// Top saturation at which a cell is re-cascaded.
    pub saturation_threshold: f64,
    /// Re-cascade budget for saturated cells.
    pub cascade_budget: u32,
}

impl Default for SeepConfig {
    fn default() -> Self {
        Self {
            infiltration_rate: 0.1,
            percolation_rate: 0.05,
            saturation_threshold: 0.95,
            cascade_budget: 1,
        }
    }
}

/// Parameters for all erosion processes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionConfig {
    pub water: WaterConfig,
    pub wind: WindConfig,
    pub cascade: CascadeConfig,
    pub seep: SeepConfig,
}
