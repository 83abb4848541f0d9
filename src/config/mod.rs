//! Configuration management for the GEX analyzer.
//!
//! Every threshold used by the pipeline lives here and is passed explicitly
//! into the components; nothing reads global state. Settings load from an
//! optional config file and `GEX__`-prefixed environment variables.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Option pricing and implied-volatility solver settings
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Gamma exposure aggregation and barrier detection
    #[serde(default)]
    pub gex: GexConfig,
    /// Technical pattern detection
    #[serde(default)]
    pub patterns: PatternConfig,
    /// Market regime classification
    #[serde(default)]
    pub regime: RegimeConfig,
    /// Signal synthesis and risk levels
    #[serde(default)]
    pub signals: SignalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Annualized risk-free rate (0.05 = 5%)
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Time to expiry in years when the request carries no dates
    #[serde(default = "default_time_to_expiry")]
    pub default_time_to_expiry: f64,
    /// Starting volatility for the Newton-Raphson solver
    #[serde(default = "default_initial_vol")]
    pub iv_initial_guess: f64,
    /// Absolute price tolerance for convergence
    #[serde(default = "default_iv_tolerance")]
    pub iv_tolerance: f64,
    /// Iteration cap before reporting a convergence failure
    #[serde(default = "default_iv_max_iterations")]
    pub iv_max_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GexConfig {
    /// Shares per contract
    #[serde(default = "default_contract_multiplier")]
    pub contract_multiplier: Decimal,
    /// Fraction of the largest weighted exposure that counts as a barrier (0.0-1.0)
    #[serde(default = "default_barrier_threshold")]
    pub barrier_threshold: f64,
    /// |net GEX| as a multiple of the mean |net GEX| that marks a concentrated wall
    #[serde(default = "default_wall_strength_threshold")]
    pub wall_strength_threshold: f64,
    /// Share of total open interest at the pin strike that flags pin risk
    #[serde(default = "default_pin_oi_ratio")]
    pub pin_oi_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Look-back window for support/resistance extrema
    #[serde(default = "default_pattern_window")]
    pub window: usize,
    /// Relative distance to the recent extreme that still counts (0.05 = 5%)
    #[serde(default = "default_level_band")]
    pub level_band: f64,
    /// Number of bars spanned by the trend comparison
    #[serde(default = "default_trend_span")]
    pub trend_span: usize,
    /// Relative change treated as flat
    #[serde(default = "default_trend_epsilon")]
    pub trend_epsilon: f64,
    /// Fixed confidence assigned to trend patterns
    #[serde(default = "default_trend_confidence")]
    pub trend_confidence: f64,
    /// Recent bars compared against the full-series true range
    #[serde(default = "default_spike_window")]
    pub spike_window: usize,
    /// Recent/historical true-range ratio that flags a spike
    #[serde(default = "default_spike_multiple")]
    pub spike_multiple: f64,
    /// Fixed confidence assigned to volatility spikes
    #[serde(default = "default_spike_confidence")]
    pub spike_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// Rolling window length in returns (clamped to the available history)
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    /// Average-return threshold separating Bull/Bear from Ranging
    #[serde(default = "default_return_epsilon")]
    pub return_epsilon: f64,
    /// Stabilizer added to the return deviation in the consistency score
    #[serde(default = "default_std_epsilon")]
    pub std_epsilon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Relative distance to a structural level that triggers a reaction (0.015 = 1.5%)
    #[serde(default = "default_proximity_band")]
    pub proximity_band: Decimal,
    /// Weight of regime confidence in the signal confidence
    #[serde(default = "default_regime_weight")]
    pub regime_weight: f64,
    /// Weight of the nearest pattern's confidence
    #[serde(default = "default_pattern_weight")]
    pub pattern_weight: f64,
    /// Weight of level proximity
    #[serde(default = "default_proximity_weight")]
    pub proximity_weight: f64,
    /// Offset placed beyond the opposing level for the stop (0.002 = 0.2%)
    #[serde(default = "default_stop_buffer")]
    pub stop_buffer: Decimal,
    /// Stop distance when no opposing level exists (0.02 = 2%)
    #[serde(default = "default_fixed_stop_pct")]
    pub fixed_stop_pct: Decimal,
    /// Target distance as a multiple of stop distance when no level lies ahead
    #[serde(default = "default_reward_multiple")]
    pub reward_multiple: Decimal,
    /// Confidence of the single NEUTRAL signal emitted without levels or patterns
    #[serde(default = "default_degenerate_confidence")]
    pub degenerate_confidence: f64,
    /// Wall and pin signals below this confidence are dropped
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

// Default value functions
fn default_risk_free_rate() -> f64 {
    0.05
}

fn default_time_to_expiry() -> f64 {
    1.0
}

fn default_initial_vol() -> f64 {
    0.2
}

fn default_iv_tolerance() -> f64 {
    1e-6
}

fn default_iv_max_iterations() -> u32 {
    100
}

fn default_contract_multiplier() -> Decimal {
    Decimal::new(100, 0)
}

fn default_barrier_threshold() -> f64 {
    0.7
}

fn default_wall_strength_threshold() -> f64 {
    2.5
}

fn default_pin_oi_ratio() -> f64 {
    0.2 // 20% of total OI at a single strike
}

fn default_pattern_window() -> usize {
    5
}

fn default_level_band() -> f64 {
    0.05
}

fn default_trend_span() -> usize {
    5
}

fn default_trend_epsilon() -> f64 {
    1e-9
}

fn default_trend_confidence() -> f64 {
    0.6
}

fn default_spike_window() -> usize {
    10
}

fn default_spike_multiple() -> f64 {
    1.5
}

fn default_spike_confidence() -> f64 {
    0.7
}

fn default_lookback() -> usize {
    20
}

fn default_return_epsilon() -> f64 {
    0.001
}

fn default_std_epsilon() -> f64 {
    0.0001
}

fn default_proximity_band() -> Decimal {
    Decimal::new(15, 3) // 0.015
}

fn default_regime_weight() -> f64 {
    0.4
}

fn default_pattern_weight() -> f64 {
    0.3
}

fn default_proximity_weight() -> f64 {
    0.3
}

fn default_stop_buffer() -> Decimal {
    Decimal::new(2, 3) // 0.002
}

fn default_fixed_stop_pct() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn default_reward_multiple() -> Decimal {
    Decimal::new(2, 0)
}

fn default_degenerate_confidence() -> f64 {
    0.1
}

fn default_min_confidence() -> f64 {
    0.6
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        Self::load_from("gex")
    }

    /// Load configuration from the named file (extension optional) layered
    /// under `GEX__`-prefixed environment variables.
    pub fn load_from(file: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix("GEX").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.pricing.default_time_to_expiry > 0.0,
            "default_time_to_expiry must be positive"
        );

        anyhow::ensure!(
            self.pricing.iv_initial_guess > 0.0 && self.pricing.iv_tolerance > 0.0,
            "iv_initial_guess and iv_tolerance must be positive"
        );

        anyhow::ensure!(
            self.pricing.iv_max_iterations >= 1,
            "iv_max_iterations must be at least 1"
        );

        anyhow::ensure!(
            self.gex.contract_multiplier > Decimal::ZERO,
            "contract_multiplier must be positive"
        );

        anyhow::ensure!(
            (0.0..=1.0).contains(&self.gex.barrier_threshold),
            "barrier_threshold must be between 0 and 1"
        );

        anyhow::ensure!(
            self.patterns.window >= 1 && self.patterns.trend_span >= 2,
            "pattern window must be >= 1 and trend_span >= 2"
        );

        anyhow::ensure!(
            self.patterns.level_band > 0.0 && self.patterns.level_band < 1.0,
            "level_band must be between 0 and 1"
        );

        anyhow::ensure!(self.regime.lookback >= 1, "regime lookback must be >= 1");

        anyhow::ensure!(
            self.signals.proximity_band > Decimal::ZERO
                && self.signals.fixed_stop_pct > Decimal::ZERO
                && self.signals.fixed_stop_pct < Decimal::ONE,
            "proximity_band must be positive and fixed_stop_pct between 0 and 1"
        );

        anyhow::ensure!(
            self.signals.stop_buffer >= Decimal::ZERO && self.signals.stop_buffer < Decimal::ONE,
            "stop_buffer must be in [0, 1)"
        );

        anyhow::ensure!(
            self.signals.reward_multiple > Decimal::ZERO,
            "reward_multiple must be positive"
        );

        anyhow::ensure!(
            (0.0..=1.0).contains(&self.signals.min_confidence),
            "min_confidence must be between 0 and 1"
        );

        let weight_sum =
            self.signals.regime_weight + self.signals.pattern_weight + self.signals.proximity_weight;
        anyhow::ensure!(
            (weight_sum - 1.0).abs() < 1e-9,
            "signal weights must sum to 1 (got {weight_sum})"
        );

        Ok(())
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: default_risk_free_rate(),
            default_time_to_expiry: default_time_to_expiry(),
            iv_initial_guess: default_initial_vol(),
            iv_tolerance: default_iv_tolerance(),
            iv_max_iterations: default_iv_max_iterations(),
        }
    }
}

impl Default for GexConfig {
    fn default() -> Self {
        Self {
            contract_multiplier: default_contract_multiplier(),
            barrier_threshold: default_barrier_threshold(),
            wall_strength_threshold: default_wall_strength_threshold(),
            pin_oi_ratio: default_pin_oi_ratio(),
        }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            window: default_pattern_window(),
            level_band: default_level_band(),
            trend_span: default_trend_span(),
            trend_epsilon: default_trend_epsilon(),
            trend_confidence: default_trend_confidence(),
            spike_window: default_spike_window(),
            spike_multiple: default_spike_multiple(),
            spike_confidence: default_spike_confidence(),
        }
    }
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            lookback: default_lookback(),
            return_epsilon: default_return_epsilon(),
            std_epsilon: default_std_epsilon(),
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            proximity_band: default_proximity_band(),
            regime_weight: default_regime_weight(),
            pattern_weight: default_pattern_weight(),
            proximity_weight: default_proximity_weight(),
            stop_buffer: default_stop_buffer(),
            fixed_stop_pct: default_fixed_stop_pct(),
            reward_multiple: default_reward_multiple(),
            degenerate_confidence: default_degenerate_confidence(),
            min_confidence: default_min_confidence(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = Config::default();
        config.signals.pattern_weight = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stop_buffer_must_stay_below_one() {
        let mut config = Config::default();
        config.signals.stop_buffer = dec!(1);
        assert!(config.validate().is_err());

        config.signals.stop_buffer = dec!(-0.001);
        assert!(config.validate().is_err());

        config.signals.stop_buffer = Decimal::ZERO;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reward_multiple_must_be_positive() {
        let mut config = Config::default();
        config.signals.reward_multiple = Decimal::ZERO;
        assert!(config.validate().is_err());

        config.signals.reward_multiple = dec!(-1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_confidence_is_a_probability() {
        let mut config = Config::default();
        config.signals.min_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let json = r#"{ "signals": { "proximity_band": "0.02" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.signals.proximity_band, dec!(0.02));
        assert_eq!(config.signals.reward_multiple, dec!(2));
        assert_eq!(config.signals.min_confidence, 0.6);
        assert_eq!(config.regime.lookback, 20);
    }
}
