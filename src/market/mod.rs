//! Price-action analysis over OHLC bars.
//!
//! Provides:
//! - Bar validation
//! - Support/resistance, trend and volatility-spike pattern detection
//! - Strike-anchored levels from gamma walls
//! - Rolling-window regime classification (Bull / Bear / Ranging / Transition)

mod bar;
mod patterns;
mod regime;

pub use bar::{validate_bars, OhlcBar};
pub use patterns::{wall_patterns, Pattern, PatternDetector, PatternReference, PatternScan, PatternType};
pub use regime::{Regime, RegimeClassifier, RegimeType, MIN_REGIME_BARS};
