//! Declarative soil profile: soil definitions plus the strata used to seed a terrain.

use std::path::Path;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::table::{SoilTable, SoilTableError, AIR_NAME, WATER_NAME};
use crate::noise::LayerConfig;

fn default_one() -> f64 {
    1.0
}

fn default_color() -> [f32; 4] {
    [0.5, 0.5, 0.5, 1.0]
}

fn default_settling() -> f64 {
    0.2
}

/// One soil type as written in a profile. References are by name and
/// default to the soil itself when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilDef {
    pub name: String,
    #[serde(default = "default_one")]
    pub density: f64,
    #[serde(default)]
    pub porosity: f64,
    #[serde(default = "default_color")]
    pub color: [f32; 4],

    #[serde(default)]
    pub transports: Option<String>,
    #[serde(default = "default_one")]
    pub solubility: f64,
    #[serde(default = "default_one")]
    pub equilibrium_rate: f64,
    #[serde(default = "default_one")]
    pub friction: f64,

    #[serde(default)]
    pub erodes: Option<String>,
    #[serde(default = "default_one")]
    pub erosion_rate: f64,

    #[serde(default)]
    pub cascades: Option<String>,
    #[serde(default = "default_one")]
    pub max_slope: f64,
    #[serde(default = "default_settling")]
    pub settling: f64,

    #[serde(default)]
    pub abrades: Option<String>,
    #[serde(default)]
    pub suspension: f64,
}

impl SoilDef {
    /// A definition with default parameters and self references.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            density: 1.0,
            porosity: 0.0,
            color: default_color(),
            transports: None,
            solubility: 1.0,
            equilibrium_rate: 1.0,
            friction: 1.0,
            erodes: None,
            erosion_rate: 1.0,
            cascades: None,
            max_slope: 1.0,
            settling: 0.2,
            abrades: None,
            suspension: 0.0,
        }
    }
}

/// Soil definitions plus the bottom-to-top strata layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilProfile {
    pub soils: Vec<SoilDef>,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

impl SoilProfile {
    /// Parses a profile from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, SoilTableError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON profile from disk.
    pub fn load(path: &Path) -> Result<Self, SoilTableError> {
        let text = std::fs::read_to_string(path)?;
        let profile = Self::from_json_str(&text)?;
        info!(
            path = %path.display(),
            soils = profile.soils.len(),
            layers = profile.layers.len(),
            "loaded soil profile"
        );
        Ok(profile)
    }

    /// Serializes the profile as pretty JSON.
    pub fn to_json_string(&self) -> Result<String, SoilTableError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds and validates the soil table, including layer soil names.
    pub fn build_table(&self) -> Result<SoilTable, SoilTableError> {
        let table = SoilTable::from_defs(&self.soils)?;
        for layer in &self.layers {
            if table.lookup(&layer.soil).is_none() {
                return Err(SoilTableError::UnknownLayerSoil(layer.soil.clone()));
            }
        }
        Ok(table)
    }
}

impl Default for SoilProfile {
    /// Rock bed with gravel, soil and a sand veneer.
    fn default() -> Self {
        let soil = |name: &str,
                    color: [f32; 4],
                    density: f64,
                    porosity: f64,
                    friction: f64| {
            SoilDef {
                density,
                porosity,
                color,
                friction,
                ..SoilDef::named(name)
            }
        };
        let name = |s: &str| Some(s.to_string());

        let air = SoilDef {
            solubility: 0.0,
            equilibrium_rate: 0.0,
            max_slope: 1000.0,
            settling: 0.0,
            ..soil(AIR_NAME, [0.75, 0.85, 0.9, 1.0], 0.0, 1.0, 1.0)
        };

        let water = SoilDef {
            solubility: 0.0,
            equilibrium_rate: 0.0,
            max_slope: 0.0,
            settling: 1.0,
            ..soil(WATER_NAME, [0.27, 0.57, 0.6, 1.0], 1.0, 0.0, 0.5)
        };

        let rock = SoilDef {
            transports: name("Gravel"),
            solubility: 0.4,
            equilibrium_rate: 0.2,
            erodes: name("Gravel"),
            erosion_rate: 0.4,
            cascades: name("Gravel"),
            max_slope: 0.02,
            settling: 0.2,
            abrades: name("Sand"),
            suspension: 0.0005,
            ..soil("Rock", [0.45, 0.45, 0.45, 1.0], 2.6, 0.05, 0.9)
        };

        let gravel = SoilDef {
            solubility: 0.8,
            equilibrium_rate: 0.5,
            erodes: name("Sand"),
            erosion_rate: 0.3,
            max_slope: 0.008,
            settling: 0.5,
            abrades: name("Sand"),
            suspension: 0.002,
            ..soil("Gravel", [0.55, 0.5, 0.45, 1.0], 2.0, 0.3, 0.8)
        };

        let sand = SoilDef {
            solubility: 1.0,
            equilibrium_rate: 0.8,
            erosion_rate: 1.0,
            max_slope: 0.004,
            settling: 0.8,
            suspension: 0.01,
            ..soil("Sand", [0.86, 0.74, 0.39, 1.0], 1.6, 0.4, 0.7)
        };

        let topsoil = SoilDef {
            solubility: 1.0,
            equilibrium_rate: 0.6,
            erosion_rate: 0.8,
            max_slope: 0.002,
            settling: 0.3,
            abrades: name("Sand"),
            suspension: 0.005,
            ..soil("Soil", [0.32, 0.52, 0.32, 1.0], 1.3, 0.5, 0.8)
        };

        Self {
            soils: vec![air, water, rock, gravel, sand, topsoil],
            layers: vec![
                LayerConfig {
                    bias: 0.15,
                    scale: 0.6,
                    octaves: 8,
                    frequency: 3.0,
                    ..LayerConfig::for_soil("Rock")
                },
                LayerConfig {
                    bias: -0.05,
                    scale: 0.12,
                    octaves: 4,
                    frequency: 6.0,
                    ..LayerConfig::for_soil("Gravel")
                },
                LayerConfig {
                    bias: -0.02,
                    scale: 0.08,
                    frequency: 5.0,
                    ..LayerConfig::for_soil("Soil")
                },
                LayerConfig {
                    bias: -0.04,
                    scale: 0.06,
                    octaves: 3,
                    frequency: 8.0,
                    ..LayerConfig::for_soil("Sand")
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil::SoilType;

    #[test]
    fn test_default_profile_builds() {
        let profile = SoilProfile::default();
        let table = profile.build_table().unwrap();
        assert_eq!(table.len(), 6);
        let rock = table.lookup("Rock").unwrap();
        assert_eq!(table.param(rock).transports, table.lookup("Gravel").unwrap());
        assert_eq!(table.param(rock).abrades, table.lookup("Sand").unwrap());
        assert_eq!(table.param(SoilType::AIR).suspension, 0.0);
    }

    #[test]
    fn test_json_round_trip_preserves_table() {
        let profile = SoilProfile::default();
        let json = profile.to_json_string().unwrap();
        let parsed = SoilProfile::from_json_str(&json).unwrap();
        let a = profile.build_table().unwrap();
        let b = parsed.build_table().unwrap();
        for soil in a.types() {
            assert_eq!(a.name(soil), b.name(soil));
            assert_eq!(a.param(soil), b.param(soil));
        }
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "soils": [
                { "name": "Air" },
                { "name": "Water" },
                { "name": "Clay", "porosity": 0.2, "cascades": "Water" }
            ]
        }"#;
        let table = SoilProfile::from_json_str(json).unwrap().build_table().unwrap();
        let clay = table.lookup("Clay").unwrap();
        assert_eq!(table.param(clay).porosity, 0.2);
        assert_eq!(table.param(clay).cascades, SoilType::WATER);
        assert_eq!(table.param(clay).transports, clay);
    }

    #[test]
    fn test_unknown_layer_soil_is_rejected() {
        let mut profile = SoilProfile::default();
        profile.layers.push(LayerConfig::for_soil("Basalt"));
        let err = profile.build_table().unwrap_err();
        assert!(matches!(err, SoilTableError::UnknownLayerSoil(name) if name == "Basalt"));
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let err = SoilProfile::from_json_str("{ soils: ").unwrap_err();
        assert!(matches!(err, SoilTableError::Json(_)));
    }
}
