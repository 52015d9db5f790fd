//! Soil type registry with validated cross references.

use std::collections::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::profile::SoilDef;

/// Name of the mandatory empty-space sentinel.
pub const AIR_NAME: &str = "Air";
/// Name of the mandatory standing-water sentinel.
pub const WATER_NAME: &str = "Water";

/// Material tag. Ids are handed out by a [`SoilTable`]; the two sentinels are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoilType(pub u16);

impl SoilType {
    /// Empty space above the ground surface.
    pub const AIR: SoilType = SoilType(0);
    /// Standing water deposited by pooling.
    pub const WATER: SoilType = SoilType(1);

    /// Index into the owning table.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// True for the Air and Water sentinels.
    #[inline]
    pub fn is_fluid(self) -> bool {
        self == Self::AIR || self == Self::WATER
    }
}

impl Default for SoilType {
    fn default() -> Self {
        Self::AIR
    }
}

/// Per-material erosion and transport parameters with resolved references.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilParam {
    /// Relative density (informational, exported with the profile).
    pub density: f64,
    /// Pore fraction available to seeping water (0-1).
    pub porosity: f64,
    /// Display color (linear RGBA, 0-1).
    pub color: [f32; 4],

    /// Material a water particle picks up from this surface.
    pub transports: SoilType,
    /// Relative solubility in water.
    pub solubility: f64,
    /// Rate at which carried sediment approaches equilibrium.
    pub equilibrium_rate: f64,
    /// Surface friction felt by water particles (0-1).
    pub friction: f64,

    /// Material this type breaks down into while carried.
    pub erodes: SoilType,
    /// Traffic frequency above which carried material breaks down.
    pub erosion_rate: f64,

    /// Material deposited downhill when this type slumps.
    pub cascades: SoilType,
    /// Maximum stable height difference to a neighbour.
    pub max_slope: f64,
    /// Fraction of the excess moved per cascade step.
    pub settling: f64,

    /// Material wind abrasion turns this surface into.
    pub abrades: SoilType,
    /// Wind suspension rate; zero means wind cannot carry it.
    pub suspension: f64,
}

impl SoilParam {
    /// Color as 8-bit RGBA.
    pub fn color_rgba8(&self) -> [u8; 4] {
        self.color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }

    fn references(&self) -> [(&'static str, SoilType); 4] {
        [
            ("transports", self.transports),
            ("erodes", self.erodes),
            ("cascades", self.cascades),
            ("abrades", self.abrades),
        ]
    }
}

/// Errors raised while building or editing a soil table.
#[derive(Error, Debug)]
pub enum SoilTableError {
    #[error("Missing mandatory soil type '{0}'")]
    MissingSentinel(&'static str),
    #[error("Soil type '{0}' is declared more than once")]
    DuplicateSoil(String),
    #[error("Soil '{soil}' references unknown soil '{target}' in '{field}'")]
    UnknownReference {
        soil: String,
        field: &'static str,
        target: String,
    },
    #[error("Too many soil types: {0}")]
    TooManySoils(usize),
    #[error("Layer references unknown soil '{0}'")]
    UnknownLayerSoil(String),
    #[error("Air must not be suspended, got suspension {0}")]
    SuspendedAir(f64),
    #[error("Soil id {0} is not part of this table")]
    InvalidSoilId(u16),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Profile parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Validated mapping `SoilType -> SoilParam` plus name lookup.
///
/// Referential integrity is checked once when the table is built, so lookups
/// during simulation never fail for ids issued by this table.
#[derive(Debug, Clone)]
pub struct SoilTable {
    params: Vec<SoilParam>,
    names: Vec<String>,
    by_name: HashMap<String, SoilType>,
}

impl SoilTable {
    /// Builds a table from declarative definitions.
    ///
    /// `Air` and `Water` must be present; they always receive ids 0 and 1.
    /// Other types are numbered in declaration order.
    pub fn from_defs(defs: &[SoilDef]) -> Result<Self, SoilTableError> {
        let mut seen = HashSet::new();
        for def in defs {
            if !seen.insert(def.name.as_str()) {
                return Err(SoilTableError::DuplicateSoil(def.name.clone()));
            }
        }

        let mut ordered: Vec<&SoilDef> = Vec::with_capacity(defs.len());
        for sentinel in [AIR_NAME, WATER_NAME] {
            let def = defs
                .iter()
                .find(|d| d.name == sentinel)
                .ok_or(SoilTableError::MissingSentinel(sentinel))?;
            ordered.push(def);
        }
        ordered.extend(defs.iter().filter(|d| d.name != AIR_NAME && d.name != WATER_NAME));

        if ordered.len() > u16::MAX as usize {
            return Err(SoilTableError::TooManySoils(ordered.len()));
        }

        let by_name: HashMap<String, SoilType> = ordered
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), SoilType(i as u16)))
            .collect();

        let resolve = |def: &SoilDef, field: &'static str, target: &Option<String>| {
            let target = target.as_deref().unwrap_or(&def.name);
            by_name
                .get(target)
                .copied()
                .ok_or_else(|| SoilTableError::UnknownReference {
                    soil: def.name.clone(),
                    field,
                    target: target.to_string(),
                })
        };

        let mut params = Vec::with_capacity(ordered.len());
        for def in &ordered {
            params.push(SoilParam {
                density: def.density,
                porosity: def.porosity.clamp(0.0, 1.0),
                color: def.color,
                transports: resolve(def, "transports", &def.transports)?,
                solubility: def.solubility,
                equilibrium_rate: def.equilibrium_rate,
                friction: def.friction.clamp(0.0, 1.0),
                erodes: resolve(def, "erodes", &def.erodes)?,
                erosion_rate: def.erosion_rate,
                cascades: resolve(def, "cascades", &def.cascades)?,
                max_slope: def.max_slope.max(0.0),
                settling: def.settling.clamp(0.0, 1.0),
                abrades: resolve(def, "abrades", &def.abrades)?,
                suspension: def.suspension.max(0.0),
            });
        }

        if params[SoilType::AIR.index()].suspension != 0.0 {
            return Err(SoilTableError::SuspendedAir(params[SoilType::AIR.index()].suspension));
        }

        Ok(Self {
            params,
            names: ordered.iter().map(|d| d.name.clone()).collect(),
            by_name,
        })
    }

    /// Number of registered soil types.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Always false for a built table (sentinels are mandatory).
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters for `soil`.
    ///
    /// # Panics
    /// If `soil` was not issued by this table.
    #[inline]
    pub fn param(&self, soil: SoilType) -> &SoilParam {
        &self.params[soil.index()]
    }

    /// Looks a soil type up by name.
    pub fn lookup(&self, name: &str) -> Option<SoilType> {
        self.by_name.get(name).copied()
    }

    /// Name of `soil`.
    pub fn name(&self, soil: SoilType) -> &str {
        &self.names[soil.index()]
    }

    /// Iterates all soil types in id order.
    pub fn types(&self) -> impl Iterator<Item = SoilType> + '_ {
        (0..self.params.len()).map(|i| SoilType(i as u16))
    }

    /// Replaces the parameters of `soil` (live editing).
    ///
    /// References are re-validated so the table stays closed under lookup.
    pub fn set_param(&mut self, soil: SoilType, param: SoilParam) -> Result<(), SoilTableError> {
        if soil.index() >= self.params.len() {
            return Err(SoilTableError::InvalidSoilId(soil.0));
        }
        if soil == SoilType::AIR && param.suspension != 0.0 {
            return Err(SoilTableError::SuspendedAir(param.suspension));
        }
        for (field, target) in param.references() {
            if target.index() >= self.params.len() {
                return Err(SoilTableError::UnknownReference {
                    soil: self.names[soil.index()].clone(),
                    field,
                    target: format!("#{}", target.0),
                });
            }
        }
        self.params[soil.index()] = param;
        Ok(())
    }
}
