//! Newton-Raphson implied-volatility solver.

use super::black_scholes::{BlackScholes, PricingInputs};
use super::OptionType;
use crate::config::PricingConfig;
use crate::error::{AnalysisError, Result};
use tracing::{debug, warn};

/// Vega below this makes the Newton step meaningless.
const MIN_VEGA: f64 = 1e-12;

/// Solves for the volatility that reproduces a market price.
#[derive(Debug, Clone)]
pub struct ImpliedVolSolver {
    initial_guess: f64,
    tolerance: f64,
    max_iterations: u32,
}

impl ImpliedVolSolver {
    /// Create a solver with explicit parameters.
    pub fn new(initial_guess: f64, tolerance: f64, max_iterations: u32) -> Self {
        Self {
            initial_guess,
            tolerance,
            max_iterations,
        }
    }

    /// Create a solver from the pricing configuration.
    pub fn from_config(config: &PricingConfig) -> Self {
        Self::new(
            config.iv_initial_guess,
            config.iv_tolerance,
            config.iv_max_iterations,
        )
    }

    /// Find sigma such that the model price matches `market_price`.
    ///
    /// The `volatility` field of `inputs` is ignored. Prices outside the
    /// no-arbitrage bounds are rejected up front; a run that exhausts the
    /// iteration cap returns [`AnalysisError::NumericConvergence`].
    pub fn solve(&self, market_price: f64, inputs: &PricingInputs) -> Result<f64> {
        self.check_bounds(market_price, inputs)?;

        let mut sigma = self.initial_guess;
        for iteration in 0..self.max_iterations {
            let trial = PricingInputs {
                volatility: sigma,
                ..*inputs
            };
            let greeks = BlackScholes::greeks(&trial)?;
            let diff = greeks.price - market_price;

            if diff.abs() < self.tolerance {
                debug!(iteration, sigma, "Implied volatility converged");
                return Ok(sigma);
            }

            if greeks.vega < MIN_VEGA {
                warn!(iteration, sigma, vega = greeks.vega, "Vega vanished during IV solve");
                return Err(AnalysisError::NumericConvergence {
                    iterations: iteration + 1,
                    last_estimate: sigma,
                });
            }

            let next = sigma - diff / greeks.vega;
            if !next.is_finite() {
                return Err(AnalysisError::NumericConvergence {
                    iterations: iteration + 1,
                    last_estimate: sigma,
                });
            }
            // Overshooting below zero halves the current estimate instead
            sigma = if next <= 0.0 { sigma / 2.0 } else { next };
        }

        warn!(
            max_iterations = self.max_iterations,
            sigma, market_price, "Implied volatility did not converge"
        );
        Err(AnalysisError::NumericConvergence {
            iterations: self.max_iterations,
            last_estimate: sigma,
        })
    }

    fn check_bounds(&self, market_price: f64, inputs: &PricingInputs) -> Result<()> {
        if !market_price.is_finite() || market_price <= 0.0 {
            return Err(AnalysisError::invalid(format!(
                "market price must be positive (got {market_price})"
            )));
        }
        if inputs.time_to_expiry <= 0.0 || inputs.spot <= 0.0 || inputs.strike <= 0.0 {
            return Err(AnalysisError::invalid(
                "spot, strike and time to expiry must be positive",
            ));
        }

        let discounted_strike = inputs.strike * (-inputs.rate * inputs.time_to_expiry).exp();
        let (lower, upper) = match inputs.option_type {
            OptionType::Call => ((inputs.spot - discounted_strike).max(0.0), inputs.spot),
            OptionType::Put => ((discounted_strike - inputs.spot).max(0.0), discounted_strike),
        };

        if market_price < lower - self.tolerance || market_price > upper + self.tolerance {
            return Err(AnalysisError::invalid(format!(
                "market price {market_price} outside no-arbitrage bounds [{lower}, {upper}]"
            )));
        }
        Ok(())
    }
}

impl Default for ImpliedVolSolver {
    fn default() -> Self {
        Self::from_config(&PricingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(strike: f64, option_type: OptionType, volatility: f64) -> PricingInputs {
        PricingInputs {
            spot: 100.0,
            strike,
            rate: 0.05,
            volatility,
            time_to_expiry: 0.5,
            option_type,
        }
    }

    #[test]
    fn test_recovers_known_volatility() {
        let solver = ImpliedVolSolver::default();
        for (strike, option_type, vol) in [
            (100.0, OptionType::Call, 0.30),
            (90.0, OptionType::Put, 0.45),
            (110.0, OptionType::Call, 0.15),
        ] {
            let target = inputs(strike, option_type, vol);
            let price = BlackScholes::price(&target).unwrap();
            let iv = solver.solve(price, &target).unwrap();
            assert!((iv - vol).abs() < 1e-4, "expected {vol}, got {iv}");
        }
    }

    #[test]
    fn test_iteration_cap_reports_failure() {
        let solver = ImpliedVolSolver::new(0.2, 1e-10, 1);
        let target = inputs(100.0, OptionType::Call, 0.9);
        let price = BlackScholes::price(&target).unwrap();

        match solver.solve(price, &target) {
            Err(AnalysisError::NumericConvergence { iterations, .. }) => assert_eq!(iterations, 1),
            other => panic!("expected convergence failure, got {other:?}"),
        }
    }

    #[test]
    fn test_arbitrage_violations_rejected() {
        let solver = ImpliedVolSolver::default();
        let target = inputs(100.0, OptionType::Call, 0.2);

        // A call can never be worth more than the underlying
        assert!(matches!(
            solver.solve(150.0, &target),
            Err(AnalysisError::InvalidInput(_))
        ));
        assert!(matches!(
            solver.solve(-1.0, &target),
            Err(AnalysisError::InvalidInput(_))
        ));
    }
}
