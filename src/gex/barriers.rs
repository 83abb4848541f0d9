//! Barrier detection from distance-weighted exposure.
//!
//! The weighted exposure here is deliberately unsigned and discounted by
//! distance from spot. It ranks strikes as hedging barriers and never feeds
//! the net GEX figure.

use super::types::GexProfile;
use crate::config::GexConfig;
use crate::pricing::OptionType;
use crate::utils::decimal::to_f64;
use crate::utils::stats::{mean, percentile, std_dev};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Wall strength at which wall confidence saturates.
pub const WALL_FULL_STRENGTH: f64 = 5.0;

/// Distance-weighted exposure of one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedExposure {
    pub strike: Decimal,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    pub weighted_exposure: f64,
}

/// Distribution summary of weighted exposures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarrierStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
    /// Contracts at or above `barrier_threshold` x max
    pub significant_barriers: usize,
}

/// Strike whose net exposure dwarfs the rest of the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GammaWall {
    pub strike: Decimal,
    pub net_gex: Decimal,
    /// |net GEX| as a multiple of the mean |net GEX|
    pub strength: f64,
}

impl GammaWall {
    /// Strength scaled into [0, 1].
    pub fn confidence(&self) -> f64 {
        (self.strength / WALL_FULL_STRENGTH).clamp(0.0, 1.0)
    }
}

/// Open-interest concentration at the gamma pin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinRisk {
    pub strike: Decimal,
    pub open_interest: u64,
    pub oi_ratio: f64,
    pub flagged: bool,
}

/// Everything the barrier scan found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarrierReport {
    pub exposures: Vec<WeightedExposure>,
    pub stats: BarrierStats,
    pub walls: Vec<GammaWall>,
    pub pin_risk: Option<PinRisk>,
}

/// gamma x OI / (1 + |strike - spot| / spot)
pub fn weighted_exposure(gamma: Decimal, open_interest: u64, strike: Decimal, spot: Decimal) -> f64 {
    let spot = to_f64(spot);
    let distance = if spot != 0.0 {
        (to_f64(strike) - spot).abs() / spot
    } else {
        1.0
    };
    to_f64(gamma) * open_interest as f64 / (1.0 + distance)
}

/// Scans a [`GexProfile`] for barriers, walls and pin risk.
#[derive(Debug, Clone)]
pub struct GammaBarrierScanner {
    barrier_threshold: f64,
    wall_strength_threshold: f64,
    pin_oi_ratio: f64,
}

impl GammaBarrierScanner {
    pub fn new(config: &GexConfig) -> Self {
        Self {
            barrier_threshold: config.barrier_threshold,
            wall_strength_threshold: config.wall_strength_threshold,
            pin_oi_ratio: config.pin_oi_ratio,
        }
    }

    /// Run every barrier check over the profile.
    pub fn scan(&self, profile: &GexProfile) -> BarrierReport {
        if profile.contracts.is_empty() {
            return BarrierReport::default();
        }

        let mut exposures: Vec<WeightedExposure> = profile
            .contracts
            .iter()
            .map(|c| WeightedExposure {
                strike: c.strike,
                option_type: c.option_type,
                weighted_exposure: weighted_exposure(c.gamma, c.open_interest, c.strike, profile.spot),
            })
            .collect();
        exposures.sort_by(|a, b| a.strike.cmp(&b.strike).then(a.option_type.cmp(&b.option_type)));

        let stats = self.stats(&exposures);
        let walls = self.walls(profile);
        let pin_risk = self.pin_risk(profile);

        debug!(
            significant = stats.significant_barriers,
            walls = walls.len(),
            pin_flagged = pin_risk.as_ref().is_some_and(|p| p.flagged),
            "Barrier scan complete"
        );

        BarrierReport {
            exposures,
            stats,
            walls,
            pin_risk,
        }
    }

    fn stats(&self, exposures: &[WeightedExposure]) -> BarrierStats {
        let values: Vec<f64> = exposures.iter().map(|e| e.weighted_exposure).collect();
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);

        let significant_barriers = if max > 0.0 {
            let cutoff = self.barrier_threshold * max;
            values.iter().filter(|v| **v >= cutoff).count()
        } else {
            0
        };

        BarrierStats {
            mean: mean(&values),
            std: std_dev(&values),
            min,
            max,
            percentile_25: percentile(&values, 25.0),
            percentile_75: percentile(&values, 75.0),
            significant_barriers,
        }
    }

    fn walls(&self, profile: &GexProfile) -> Vec<GammaWall> {
        let magnitudes: Vec<f64> = profile.levels.iter().map(|l| to_f64(l.net_gex.abs())).collect();
        let average = mean(&magnitudes);
        if average <= 0.0 {
            return Vec::new();
        }

        profile
            .levels
            .iter()
            .zip(&magnitudes)
            .filter_map(|(level, magnitude)| {
                let strength = magnitude / average;
                (strength > self.wall_strength_threshold).then(|| GammaWall {
                    strike: level.strike,
                    net_gex: level.net_gex,
                    strength,
                })
            })
            .collect()
    }

    fn pin_risk(&self, profile: &GexProfile) -> Option<PinRisk> {
        let strike = profile.structural.gamma_pin?;
        let level = profile.level_at(strike)?;
        let total = profile.total_open_interest();
        let open_interest = level.total_open_interest();
        let oi_ratio = if total > 0 {
            open_interest as f64 / total as f64
        } else {
            0.0
        };

        Some(PinRisk {
            strike,
            open_interest,
            oi_ratio,
            flagged: oi_ratio > self.pin_oi_ratio,
        })
    }
}
