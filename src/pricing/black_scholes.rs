//! Black-Scholes pricing and first-order Greeks.

use super::OptionType;
use crate::error::{AnalysisError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

const DAYS_PER_YEAR: f64 = 365.0;

/// Inputs for pricing a single European option.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricingInputs {
    /// Spot price of the underlying
    pub spot: f64,
    /// Strike price
    pub strike: f64,
    /// Annualized risk-free rate (0.05 = 5%)
    pub rate: f64,
    /// Annualized volatility (0.20 = 20%)
    pub volatility: f64,
    /// Time to expiry in years
    pub time_to_expiry: f64,
    pub option_type: OptionType,
}

/// Price and first-order sensitivities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub price: f64,
    pub delta: f64,
    pub gamma: f64,
    /// Per unit of volatility (multiply by 0.01 for a 1 vol-point move)
    pub vega: f64,
    /// Per year of calendar time
    pub theta: f64,
}

/// Black-Scholes model for a single contract.
pub struct BlackScholes;

impl BlackScholes {
    /// Theoretical option price.
    pub fn price(inputs: &PricingInputs) -> Result<f64> {
        let d = D::new(inputs)?;
        Ok(d.price(inputs))
    }

    /// Delta: N(d1) for calls, N(d1) - 1 for puts.
    pub fn delta(inputs: &PricingInputs) -> Result<f64> {
        let d = D::new(inputs)?;
        Ok(match inputs.option_type {
            OptionType::Call => d.cdf(d.d1),
            OptionType::Put => d.cdf(d.d1) - 1.0,
        })
    }

    /// Gamma, identical for calls and puts.
    pub fn gamma(inputs: &PricingInputs) -> Result<f64> {
        let d = D::new(inputs)?;
        Ok(d.pdf(d.d1) / (inputs.spot * inputs.volatility * d.sqrt_t))
    }

    /// Vega, identical for calls and puts.
    pub fn vega(inputs: &PricingInputs) -> Result<f64> {
        let d = D::new(inputs)?;
        Ok(inputs.spot * d.pdf(d.d1) * d.sqrt_t)
    }

    /// Price plus delta, gamma, vega and theta in one pass.
    pub fn greeks(inputs: &PricingInputs) -> Result<Greeks> {
        let d = D::new(inputs)?;
        let s = inputs.spot;
        let k = inputs.strike;
        let r = inputs.rate;
        let sigma = inputs.volatility;

        let pdf_d1 = d.pdf(d.d1);
        let discount = (-r * inputs.time_to_expiry).exp();
        let decay = -s * pdf_d1 * sigma / (2.0 * d.sqrt_t);

        let (delta, theta) = match inputs.option_type {
            OptionType::Call => (d.cdf(d.d1), decay - r * k * discount * d.cdf(d.d2)),
            OptionType::Put => (d.cdf(d.d1) - 1.0, decay + r * k * discount * d.cdf(-d.d2)),
        };

        Ok(Greeks {
            price: d.price(inputs),
            delta,
            gamma: pdf_d1 / (s * sigma * d.sqrt_t),
            vega: s * pdf_d1 * d.sqrt_t,
            theta,
        })
    }
}

/// Shared d1/d2 terms for one set of inputs.
struct D {
    d1: f64,
    d2: f64,
    sqrt_t: f64,
    normal: Normal,
}

impl D {
    fn new(inputs: &PricingInputs) -> Result<Self> {
        validate(inputs)?;

        let sqrt_t = inputs.time_to_expiry.sqrt();
        let sigma_sqrt_t = inputs.volatility * sqrt_t;
        let d1 = ((inputs.spot / inputs.strike).ln()
            + (inputs.rate + 0.5 * inputs.volatility * inputs.volatility) * inputs.time_to_expiry)
            / sigma_sqrt_t;

        Ok(Self {
            d1,
            d2: d1 - sigma_sqrt_t,
            sqrt_t,
            normal: Normal::standard(),
        })
    }

    fn cdf(&self, x: f64) -> f64 {
        self.normal.cdf(x)
    }

    fn pdf(&self, x: f64) -> f64 {
        self.normal.pdf(x)
    }

    fn price(&self, inputs: &PricingInputs) -> f64 {
        let discounted_strike = inputs.strike * (-inputs.rate * inputs.time_to_expiry).exp();
        match inputs.option_type {
            OptionType::Call => {
                inputs.spot * self.cdf(self.d1) - discounted_strike * self.cdf(self.d2)
            }
            OptionType::Put => {
                discounted_strike * self.cdf(-self.d2) - inputs.spot * self.cdf(-self.d1)
            }
        }
    }
}

fn validate(inputs: &PricingInputs) -> Result<()> {
    let finite = [
        inputs.spot,
        inputs.strike,
        inputs.rate,
        inputs.volatility,
        inputs.time_to_expiry,
    ]
    .iter()
    .all(|v| v.is_finite());

    if !finite {
        return Err(AnalysisError::invalid("pricing inputs must be finite"));
    }
    if inputs.spot <= 0.0 || inputs.strike <= 0.0 {
        return Err(AnalysisError::invalid(format!(
            "spot and strike must be positive (spot={}, strike={})",
            inputs.spot, inputs.strike
        )));
    }
    if inputs.time_to_expiry <= 0.0 {
        return Err(AnalysisError::invalid(format!(
            "time to expiry must be positive (got {})",
            inputs.time_to_expiry
        )));
    }
    if inputs.volatility <= 0.0 {
        return Err(AnalysisError::invalid(format!(
            "volatility must be positive (got {})",
            inputs.volatility
        )));
    }
    Ok(())
}

/// Year fraction between a valuation date and an expiration date (ACT/365).
pub fn year_fraction(valuation: NaiveDate, expiration: NaiveDate) -> Result<f64> {
    let days = (expiration - valuation).num_days();
    if days <= 0 {
        return Err(AnalysisError::invalid(format!(
            "expiration {expiration} is not after valuation date {valuation}"
        )));
    }
    Ok(days as f64 / DAYS_PER_YEAR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atm(option_type: OptionType) -> PricingInputs {
        PricingInputs {
            spot: 100.0,
            strike: 100.0,
            rate: 0.05,
            volatility: 0.2,
            time_to_expiry: 1.0,
            option_type,
        }
    }

    #[test]
    fn test_reference_prices() {
        // Hull reference values for S=K=100, r=5%, sigma=20%, T=1
        let call = BlackScholes::price(&atm(OptionType::Call)).unwrap();
        let put = BlackScholes::price(&atm(OptionType::Put)).unwrap();
        assert!((call - 10.4506).abs() < 1e-3);
        assert!((put - 5.5735).abs() < 1e-3);
    }

    #[test]
    fn test_put_call_parity() {
        for strike in [80.0, 95.0, 100.0, 120.0] {
            let mut call_in = atm(OptionType::Call);
            call_in.strike = strike;
            let mut put_in = call_in;
            put_in.option_type = OptionType::Put;

            let call = BlackScholes::price(&call_in).unwrap();
            let put = BlackScholes::price(&put_in).unwrap();
            let parity = 100.0 - strike * (-0.05f64).exp();
            assert!((call - put - parity).abs() < 1e-9, "parity broken at K={strike}");
        }
    }

    #[test]
    fn test_delta_and_gamma() {
        let call_delta = BlackScholes::delta(&atm(OptionType::Call)).unwrap();
        let put_delta = BlackScholes::delta(&atm(OptionType::Put)).unwrap();
        assert!((call_delta - 0.6368).abs() < 1e-3);
        assert!((call_delta - put_delta - 1.0).abs() < 1e-12);

        let call_gamma = BlackScholes::gamma(&atm(OptionType::Call)).unwrap();
        let put_gamma = BlackScholes::gamma(&atm(OptionType::Put)).unwrap();
        assert!((call_gamma - 0.018762).abs() < 1e-5);
        assert_eq!(call_gamma, put_gamma);
    }

    #[test]
    fn test_greeks_bundle_matches_individual() {
        let inputs = atm(OptionType::Put);
        let greeks = BlackScholes::greeks(&inputs).unwrap();
        assert_eq!(greeks.price, BlackScholes::price(&inputs).unwrap());
        assert_eq!(greeks.vega, BlackScholes::vega(&inputs).unwrap());
        assert!((greeks.vega - 37.524).abs() < 1e-2);
        // Call theta is more negative than put theta when r > 0
        let call_theta = BlackScholes::greeks(&atm(OptionType::Call)).unwrap().theta;
        assert!(call_theta < greeks.theta);
        assert!((call_theta - (-6.414)).abs() < 1e-2);
    }

    #[test]
    fn test_degenerate_inputs_rejected() {
        let mut inputs = atm(OptionType::Call);
        inputs.time_to_expiry = 0.0;
        assert!(matches!(
            BlackScholes::price(&inputs),
            Err(AnalysisError::InvalidInput(_))
        ));

        let mut inputs = atm(OptionType::Call);
        inputs.volatility = -0.1;
        assert!(matches!(
            BlackScholes::gamma(&inputs),
            Err(AnalysisError::InvalidInput(_))
        ));

        let mut inputs = atm(OptionType::Call);
        inputs.spot = f64::NAN;
        assert!(BlackScholes::greeks(&inputs).is_err());
    }

    #[test]
    fn test_year_fraction() {
        let valuation = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let expiry = NaiveDate::from_ymd_opt(2024, 2, 16).unwrap();
        let t = year_fraction(valuation, expiry).unwrap();
        assert!((t - 46.0 / 365.0).abs() < 1e-12);
        assert!(year_fraction(expiry, valuation).is_err());
        assert!(year_fraction(expiry, expiry).is_err());
    }
}
