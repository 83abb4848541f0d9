//! Gamma exposure (GEX) analysis.
//!
//! Provides:
//! - Per-contract and per-strike dealer gamma exposure
//! - Structural levels: call wall, put wall, gamma flip, gamma pin
//! - Distance-weighted barrier detection and pin-risk concentration

mod aggregator;
mod barriers;
mod types;

pub use aggregator::{structural_levels, GammaExposureAggregator};
pub use barriers::{
    weighted_exposure, BarrierReport, BarrierStats, GammaBarrierScanner, GammaWall, PinRisk,
    WeightedExposure, WALL_FULL_STRENGTH,
};
pub use types::{ContractExposure, GexLevel, GexProfile, OptionContract, StructuralLevels};
