//! Dealer gamma exposure aggregation and structural level extraction.

use super::types::{ContractExposure, GexLevel, GexProfile, OptionContract, StructuralLevels};
use crate::config::{GexConfig, PricingConfig};
use crate::error::{AnalysisError, Result};
use crate::pricing::{BlackScholes, OptionType, PricingInputs};
use crate::utils::decimal::{from_f64, to_f64};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Converts an option chain and spot price into per-strike exposure.
///
/// Sign convention: dealers are assumed long calls and short puts, so call
/// exposure is positive and put exposure negative.
#[derive(Debug, Clone)]
pub struct GammaExposureAggregator {
    contract_multiplier: Decimal,
    risk_free_rate: f64,
}

impl GammaExposureAggregator {
    /// Create an aggregator from configuration.
    pub fn new(gex: &GexConfig, pricing: &PricingConfig) -> Self {
        Self {
            contract_multiplier: gex.contract_multiplier,
            risk_free_rate: pricing.risk_free_rate,
        }
    }

    /// Signed exposure of one contract with a resolved gamma.
    pub fn contract_gex(&self, contract: &OptionContract, gamma: Decimal, spot: Decimal) -> Decimal {
        let raw = gamma * Decimal::from(contract.open_interest) * self.contract_multiplier * spot;
        raw * Decimal::from(contract.option_type.sign())
    }

    /// Gamma supplied on the contract, or derived from its implied volatility.
    pub fn resolve_gamma(
        &self,
        contract: &OptionContract,
        spot: Decimal,
        time_to_expiry: f64,
    ) -> Result<Decimal> {
        if let Some(gamma) = contract.gamma {
            return Ok(gamma);
        }

        let iv = contract.implied_volatility.ok_or_else(|| {
            AnalysisError::invalid(format!(
                "{} at strike {} has neither gamma nor implied volatility",
                contract.option_type, contract.strike
            ))
        })?;

        let gamma = BlackScholes::gamma(&PricingInputs {
            spot: to_f64(spot),
            strike: to_f64(contract.strike),
            rate: self.risk_free_rate,
            volatility: iv,
            time_to_expiry,
            option_type: contract.option_type,
        })?;

        debug!(strike = %contract.strike, iv, gamma, "Resolved gamma from implied volatility");
        Ok(from_f64(gamma))
    }

    /// Aggregate the chain into a [`GexProfile`].
    ///
    /// An empty chain is not an error: it yields zero exposure and no levels.
    #[instrument(skip(self, contracts), fields(contracts = contracts.len()))]
    pub fn aggregate(
        &self,
        contracts: &[OptionContract],
        spot: Decimal,
        time_to_expiry: f64,
    ) -> Result<GexProfile> {
        if spot <= Decimal::ZERO {
            return Err(AnalysisError::invalid(format!(
                "spot must be positive (got {spot})"
            )));
        }
        if contracts.is_empty() {
            debug!("Empty option chain, no exposure");
            return Ok(GexProfile::empty(spot));
        }

        let mut exposures = Vec::with_capacity(contracts.len());
        let mut by_strike: BTreeMap<Decimal, GexLevel> = BTreeMap::new();
        let mut net_gex = Decimal::ZERO;
        let mut gex_long = Decimal::ZERO;
        let mut gex_short = Decimal::ZERO;

        for contract in contracts {
            contract.validate()?;
            let gamma = self.resolve_gamma(contract, spot, time_to_expiry)?;
            let gex = self.contract_gex(contract, gamma, spot);

            let level = by_strike
                .entry(contract.strike)
                .or_insert_with(|| GexLevel::empty(contract.strike));
            match contract.option_type {
                OptionType::Call => {
                    level.call_gex += gex;
                    level.call_open_interest += contract.open_interest;
                }
                OptionType::Put => {
                    level.put_gex += gex;
                    level.put_open_interest += contract.open_interest;
                }
            }
            level.net_gex += gex;

            net_gex += gex;
            if gex > Decimal::ZERO {
                gex_long += gex;
            } else {
                gex_short += gex.abs();
            }

            exposures.push(ContractExposure {
                ticker: contract.ticker.clone(),
                strike: contract.strike,
                option_type: contract.option_type,
                gamma,
                open_interest: contract.open_interest,
                gex,
            });
        }

        let levels: Vec<GexLevel> = by_strike.into_values().collect();
        let structural = structural_levels(&levels);

        debug!(
            strikes = levels.len(),
            %net_gex,
            call_wall = ?structural.call_wall,
            put_wall = ?structural.put_wall,
            gamma_flip = ?structural.gamma_flip,
            gamma_pin = ?structural.gamma_pin,
            "Gamma exposure aggregated"
        );

        Ok(GexProfile {
            spot,
            contracts: exposures,
            levels,
            net_gex,
            gex_long,
            gex_short,
            structural,
        })
    }
}

/// Derive walls, flip and pin from strike-ascending levels.
pub fn structural_levels(levels: &[GexLevel]) -> StructuralLevels {
    if levels.is_empty() {
        return StructuralLevels::default();
    }

    // Strict comparisons keep the lowest strike on ties
    let mut call_wall: Option<&GexLevel> = None;
    let mut put_wall: Option<&GexLevel> = None;
    let mut gamma_pin = &levels[0];

    for level in levels {
        if level.call_gex > Decimal::ZERO
            && call_wall.map_or(true, |best| level.call_gex > best.call_gex)
        {
            call_wall = Some(level);
        }
        if level.put_gex < Decimal::ZERO
            && put_wall.map_or(true, |best| level.put_gex < best.put_gex)
        {
            put_wall = Some(level);
        }
        if level.total_open_interest() > gamma_pin.total_open_interest() {
            gamma_pin = level;
        }
    }

    StructuralLevels {
        call_wall: call_wall.map(|l| l.strike),
        put_wall: put_wall.map(|l| l.strike),
        gamma_flip: Some(gamma_flip(levels)),
        gamma_pin: Some(gamma_pin.strike),
    }
}

/// First strike where cumulative net GEX crosses from negative to
/// non-negative; the lowest strike when it never does.
fn gamma_flip(levels: &[GexLevel]) -> Decimal {
    let mut cumulative = Decimal::ZERO;
    for level in levels {
        let previous = cumulative;
        cumulative += level.net_gex;
        if previous < Decimal::ZERO && cumulative >= Decimal::ZERO {
            return level.strike;
        }
    }
    levels[0].strike
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn aggregator() -> GammaExposureAggregator {
        GammaExposureAggregator::new(&GexConfig::default(), &PricingConfig::default())
    }

    fn call(strike: Decimal, gamma: Decimal, oi: u64) -> OptionContract {
        OptionContract::new(strike, OptionType::Call, gamma, oi)
    }

    fn put(strike: Decimal, gamma: Decimal, oi: u64) -> OptionContract {
        OptionContract::new(strike, OptionType::Put, gamma, oi)
    }

    #[test]
    fn test_single_call_exposure() {
        let profile = aggregator()
            .aggregate(&[call(dec!(100), dec!(0.25), 5000)], dec!(100), 1.0)
            .unwrap();
        assert_eq!(profile.net_gex, dec!(12500000));
        assert_eq!(profile.levels[0].call_gex, dec!(12500000));
    }

    #[test]
    fn test_put_offsets_call() {
        let agg = aggregator();
        let put_only = agg
            .aggregate(&[put(dec!(100), dec!(0.25), 5000)], dec!(100), 1.0)
            .unwrap();
        assert_eq!(put_only.net_gex, dec!(-12500000));

        let both = agg
            .aggregate(
                &[call(dec!(100), dec!(0.25), 5000), put(dec!(100), dec!(0.25), 5000)],
                dec!(100),
                1.0,
            )
            .unwrap();
        assert_eq!(both.net_gex, Decimal::ZERO);
        assert_eq!(both.gex_long, dec!(12500000));
        assert_eq!(both.gex_short, dec!(12500000));
        assert_eq!(both.levels.len(), 1);
    }

    #[test]
    fn test_empty_chain() {
        let profile = aggregator().aggregate(&[], dec!(100), 1.0).unwrap();
        assert_eq!(profile.net_gex, Decimal::ZERO);
        assert!(profile.levels.is_empty());
        assert!(profile.structural.is_empty());
    }

    #[test]
    fn test_net_equals_call_plus_put() {
        let chain = vec![
            call(dec!(98), dec!(0.15), 5000),
            call(dec!(99), dec!(0.25), 8000),
            call(dec!(100), dec!(0.28), 12000),
            put(dec!(98), dec!(0.08), 2000),
            put(dec!(99), dec!(0.12), 3500),
            put(dec!(101), dec!(0.08), 2000),
        ];
        let profile = aggregator().aggregate(&chain, dec!(100), 1.0).unwrap();

        let calls: Decimal = profile.levels.iter().map(|l| l.call_gex).sum();
        let puts: Decimal = profile.levels.iter().map(|l| l.put_gex).sum();
        assert_eq!(profile.net_gex, calls + puts);
        assert_eq!(profile.gex_long - profile.gex_short, profile.net_gex);

        let strikes: Vec<Decimal> = profile.levels.iter().map(|l| l.strike).collect();
        assert_eq!(strikes, vec![dec!(98), dec!(99), dec!(100), dec!(101)]);
    }

    #[test]
    fn test_walls_and_pin() {
        let chain = vec![
            call(dec!(100), dec!(0.10), 1000),
            call(dec!(105), dec!(0.20), 1000),
            call(dec!(110), dec!(0.20), 1000), // ties 105, lower strike wins
            put(dec!(90), dec!(0.30), 1000),
            put(dec!(95), dec!(0.10), 4000),
        ];
        let profile = aggregator().aggregate(&chain, dec!(100), 1.0).unwrap();
        let levels = &profile.structural;

        assert_eq!(levels.call_wall, Some(dec!(105)));
        // 90: -0.30*1000, 95: -0.10*4000 => 95 is more negative
        assert_eq!(levels.put_wall, Some(dec!(95)));
        assert_eq!(levels.gamma_pin, Some(dec!(95)));
    }

    #[test]
    fn test_put_wall_and_pin_ties_take_lowest_strike() {
        let chain = vec![put(dec!(95), dec!(0.2), 1000), put(dec!(90), dec!(0.2), 1000)];
        let profile = aggregator().aggregate(&chain, dec!(100), 1.0).unwrap();

        assert_eq!(profile.levels[0].put_gex, profile.levels[1].put_gex);
        assert_eq!(profile.structural.put_wall, Some(dec!(90)));
        assert_eq!(profile.structural.gamma_pin, Some(dec!(90)));
        assert_eq!(profile.structural.call_wall, None);
    }

    #[test]
    fn test_gamma_flip_crossing() {
        let chain = vec![
            put(dec!(90), dec!(0.10), 1000),  // cumulative negative
            put(dec!(95), dec!(0.10), 1000),  // more negative
            call(dec!(100), dec!(0.15), 1000), // still negative (-0.05)
            call(dec!(105), dec!(0.10), 1000), // crosses to +0.05
            put(dec!(110), dec!(0.50), 1000),
        ];
        let profile = aggregator().aggregate(&chain, dec!(100), 1.0).unwrap();
        assert_eq!(profile.structural.gamma_flip, Some(dec!(105)));
    }

    #[test]
    fn test_gamma_flip_without_crossing_is_lowest_strike() {
        let chain = vec![call(dec!(95), dec!(0.1), 100), call(dec!(100), dec!(0.1), 100)];
        let profile = aggregator().aggregate(&chain, dec!(100), 1.0).unwrap();
        assert_eq!(profile.structural.gamma_flip, Some(dec!(95)));
        assert_eq!(profile.structural.put_wall, None);
    }

    #[test]
    fn test_gamma_resolved_from_iv() {
        let agg = aggregator();
        let contract = OptionContract::from_iv(dec!(100), OptionType::Call, 0.2, 1000);
        let gamma = agg.resolve_gamma(&contract, dec!(100), 1.0).unwrap();
        assert!((to_f64(gamma) - 0.018762).abs() < 1e-5);

        let profile = agg.aggregate(&[contract], dec!(100), 1.0).unwrap();
        assert!(profile.net_gex > Decimal::ZERO);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let agg = aggregator();
        assert!(agg
            .aggregate(&[call(dec!(100), dec!(0.1), 1)], dec!(0), 1.0)
            .is_err());
        assert!(agg
            .aggregate(&[call(dec!(100), dec!(-0.1), 1)], dec!(100), 1.0)
            .is_err());

        let iv_contract = OptionContract::from_iv(dec!(100), OptionType::Put, 0.3, 10);
        assert!(matches!(
            agg.aggregate(&[iv_contract], dec!(100), 0.0),
            Err(AnalysisError::InvalidInput(_))
        ));
    }
}
