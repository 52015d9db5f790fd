//! Soil types and their erosion parameters.
//!
//! A [`SoilTable`] is built once from a [`SoilProfile`] before the simulation
//! starts and is then passed by reference into every terrain operation.

mod profile;
mod table;

pub use profile::{SoilDef, SoilProfile};
pub use table::{SoilParam, SoilTable, SoilTableError, SoilType, AIR_NAME, WATER_NAME};
