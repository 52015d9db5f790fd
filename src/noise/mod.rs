//! Noise-driven seeding of initial terrain strata.
//!
//! Uses simdnoise for SIMD-accelerated fBm fields.

mod strata;

pub use strata::{build_strata, LayerConfig};
