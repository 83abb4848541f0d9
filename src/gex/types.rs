//! Option contract input and gamma exposure records.

use crate::error::{AnalysisError, Result};
use crate::pricing::OptionType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One option series from the chain snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Optional instrument label (e.g. "SPY")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    pub strike: Decimal,
    #[serde(rename = "type", alias = "option_type", alias = "tipo")]
    pub option_type: OptionType,
    /// Per-share gamma; resolved from `implied_volatility` when absent
    #[serde(default)]
    pub gamma: Option<Decimal>,
    #[serde(alias = "oi")]
    pub open_interest: u64,
    #[serde(default, alias = "iv", skip_serializing_if = "Option::is_none")]
    pub implied_volatility: Option<f64>,
}

impl OptionContract {
    /// Create a contract with a known gamma.
    pub fn new(strike: Decimal, option_type: OptionType, gamma: Decimal, open_interest: u64) -> Self {
        Self {
            ticker: None,
            strike,
            option_type,
            gamma: Some(gamma),
            open_interest,
            implied_volatility: None,
        }
    }

    /// Create a contract whose gamma is derived from implied volatility.
    pub fn from_iv(
        strike: Decimal,
        option_type: OptionType,
        implied_volatility: f64,
        open_interest: u64,
    ) -> Self {
        Self {
            ticker: None,
            strike,
            option_type,
            gamma: None,
            open_interest,
            implied_volatility: Some(implied_volatility),
        }
    }

    /// Check strike, gamma and IV ranges.
    pub fn validate(&self) -> Result<()> {
        if self.strike <= Decimal::ZERO {
            return Err(AnalysisError::invalid(format!(
                "strike must be positive (got {})",
                self.strike
            )));
        }
        if let Some(gamma) = self.gamma {
            if gamma < Decimal::ZERO {
                return Err(AnalysisError::invalid(format!(
                    "gamma must be non-negative at strike {} (got {gamma})",
                    self.strike
                )));
            }
        }
        match self.implied_volatility {
            Some(iv) if !iv.is_finite() || iv <= 0.0 => {
                return Err(AnalysisError::invalid(format!(
                    "implied volatility must be positive at strike {} (got {iv})",
                    self.strike
                )));
            }
            None if self.gamma.is_none() => {
                return Err(AnalysisError::invalid(format!(
                    "{} at strike {} has neither gamma nor implied volatility",
                    self.option_type, self.strike
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

/// A contract after gamma resolution, with its signed exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractExposure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    pub strike: Decimal,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    pub gamma: Decimal,
    pub open_interest: u64,
    /// gamma x OI x multiplier x spot x sign(type)
    pub gex: Decimal,
}

/// Aggregated exposure at one strike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GexLevel {
    pub strike: Decimal,
    pub call_gex: Decimal,
    pub put_gex: Decimal,
    pub net_gex: Decimal,
    pub call_open_interest: u64,
    pub put_open_interest: u64,
}

impl GexLevel {
    pub(crate) fn empty(strike: Decimal) -> Self {
        Self {
            strike,
            call_gex: Decimal::ZERO,
            put_gex: Decimal::ZERO,
            net_gex: Decimal::ZERO,
            call_open_interest: 0,
            put_open_interest: 0,
        }
    }

    /// Combined call and put open interest.
    pub fn total_open_interest(&self) -> u64 {
        self.call_open_interest + self.put_open_interest
    }
}

/// Strikes where dealer hedging is expected to shape price action.
///
/// Every level is `None` when the chain is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralLevels {
    /// Largest positive call exposure (resistance)
    pub call_wall: Option<Decimal>,
    /// Largest negative put exposure (support)
    pub put_wall: Option<Decimal>,
    /// Where cumulative net exposure turns non-negative
    pub gamma_flip: Option<Decimal>,
    /// Largest total open interest
    pub gamma_pin: Option<Decimal>,
}

impl StructuralLevels {
    /// True when no level could be derived.
    pub fn is_empty(&self) -> bool {
        self.call_wall.is_none()
            && self.put_wall.is_none()
            && self.gamma_flip.is_none()
            && self.gamma_pin.is_none()
    }

    /// Distinct defined levels in ascending order.
    pub fn distinct(&self) -> Vec<Decimal> {
        let mut levels: Vec<Decimal> = [self.call_wall, self.put_wall, self.gamma_flip, self.gamma_pin]
            .into_iter()
            .flatten()
            .collect();
        levels.sort();
        levels.dedup();
        levels
    }
}

/// Full aggregation output for one chain snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GexProfile {
    pub spot: Decimal,
    pub contracts: Vec<ContractExposure>,
    /// One entry per distinct strike, ascending
    pub levels: Vec<GexLevel>,
    pub net_gex: Decimal,
    /// Sum of positive contract exposures
    pub gex_long: Decimal,
    /// Absolute sum of negative contract exposures
    pub gex_short: Decimal,
    pub structural: StructuralLevels,
}

impl GexProfile {
    /// Profile of an empty chain.
    pub fn empty(spot: Decimal) -> Self {
        Self {
            spot,
            contracts: Vec::new(),
            levels: Vec::new(),
            net_gex: Decimal::ZERO,
            gex_long: Decimal::ZERO,
            gex_short: Decimal::ZERO,
            structural: StructuralLevels::default(),
        }
    }

    /// Total open interest across the chain.
    pub fn total_open_interest(&self) -> u64 {
        self.levels.iter().map(GexLevel::total_open_interest).sum()
    }

    /// Level record at an exact strike.
    pub fn level_at(&self, strike: Decimal) -> Option<&GexLevel> {
        self.levels
            .binary_search_by(|level| level.strike.cmp(&strike))
            .ok()
            .map(|idx| &self.levels[idx])
    }
}
