//! End-to-end analysis pipeline.

use super::input::{AnalysisInput, AnalysisReport};
use crate::config::Config;
use crate::error::Result;
use crate::gex::{GammaBarrierScanner, GammaExposureAggregator};
use crate::market::{wall_patterns, PatternDetector, Regime, RegimeClassifier};
use crate::strategy::{SignalEvaluator, SignalSynthesizer};
use tracing::{debug, info, instrument};

/// Runs every analysis stage over one [`AnalysisInput`].
///
/// Holds no mutable state; one engine can serve any number of runs and be
/// shared across threads.
#[derive(Debug, Clone)]
pub struct AnalysisEngine {
    default_time_to_expiry: f64,
    aggregator: GammaExposureAggregator,
    barrier_scanner: GammaBarrierScanner,
    pattern_detector: PatternDetector,
    regime_classifier: RegimeClassifier,
    synthesizer: SignalSynthesizer,
}

impl AnalysisEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            default_time_to_expiry: config.pricing.default_time_to_expiry,
            aggregator: GammaExposureAggregator::new(&config.gex, &config.pricing),
            barrier_scanner: GammaBarrierScanner::new(&config.gex),
            pattern_detector: PatternDetector::new(&config.patterns),
            regime_classifier: RegimeClassifier::new(&config.regime),
            synthesizer: SignalSynthesizer::new(&config.signals),
        }
    }

    /// Validate the input, then aggregate, scan, detect, classify and
    /// synthesize. Short bar series degrade to empty patterns and a neutral
    /// regime instead of failing the run.
    #[instrument(
        skip(self, input),
        fields(spot = %input.spot, contracts = input.contracts.len(), bars = input.bars.len())
    )]
    pub fn run(&self, input: &AnalysisInput) -> Result<AnalysisReport> {
        input.validate()?;

        let time_to_expiry = input
            .time_to_expiry()?
            .unwrap_or(self.default_time_to_expiry);

        let profile = self
            .aggregator
            .aggregate(&input.contracts, input.spot, time_to_expiry)?;
        let barriers = self.barrier_scanner.scan(&profile);

        let mut patterns = self.pattern_detector.detect(&input.bars);
        if patterns.is_empty() {
            debug!(bars = input.bars.len(), "No patterns detected");
        }
        patterns.extend(wall_patterns(&barriers.walls, input.spot));
        patterns.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let regimes = self.regime_classifier.classify(&input.bars);
        let current = regimes
            .last()
            .cloned()
            .unwrap_or_else(|| Regime::neutral(&input.bars));

        let signals = self.synthesizer.synthesize(
            profile.net_gex,
            &profile.structural,
            &barriers,
            &patterns,
            &current,
            input.spot,
        );
        let evaluation = SignalEvaluator::evaluate(&signals);

        info!(
            net_gex = %profile.net_gex,
            strikes = profile.levels.len(),
            patterns = patterns.len(),
            regime = %current.regime_type,
            signals = signals.len(),
            direction = ?signals.first().map(|s| s.direction),
            "Analysis complete"
        );

        Ok(AnalysisReport {
            spot: input.spot,
            time_to_expiry,
            gex_levels: profile.levels,
            contracts: profile.contracts,
            net_gex: profile.net_gex,
            gex_long: profile.gex_long,
            gex_short: profile.gex_short,
            structural_levels: profile.structural,
            barriers,
            patterns,
            regimes,
            signals,
            evaluation,
        })
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::gex::OptionContract;
    use crate::market::{OhlcBar, PatternReference, PatternType, RegimeType};
    use crate::pricing::OptionType;
    use crate::strategy::Direction;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn rising_bars(count: usize) -> Vec<OhlcBar> {
        (0..count)
            .map(|i| {
                let close = dec!(100) + Decimal::from(i);
                OhlcBar::new(close - dec!(0.5), close + dec!(0.5), close - dec!(1), close, dec!(1000))
            })
            .collect()
    }

    fn chain() -> Vec<OptionContract> {
        vec![
            OptionContract::new(dec!(95), OptionType::Put, dec!(0.03), 4000),
            OptionContract::new(dec!(100), OptionType::Call, dec!(0.05), 6000),
            OptionContract::new(dec!(100), OptionType::Put, dec!(0.05), 2000),
            OptionContract::new(dec!(110), OptionType::Call, dec!(0.02), 8000),
        ]
    }

    #[test]
    fn test_scenario_a_single_call() {
        let input = AnalysisInput::new(
            dec!(100),
            vec![OptionContract::new(dec!(100), OptionType::Call, dec!(0.25), 5000)],
        );
        let report = AnalysisEngine::default().run(&input).unwrap();
        assert_eq!(report.net_gex, dec!(12500000));
        assert_eq!(report.gex_levels.len(), 1);
        assert_eq!(report.structural_levels.call_wall, Some(dec!(100)));
    }

    #[test]
    fn test_scenario_b_put_and_combined() {
        let put = OptionContract::new(dec!(100), OptionType::Put, dec!(0.25), 5000);
        let report = AnalysisEngine::default()
            .run(&AnalysisInput::new(dec!(100), vec![put.clone()]))
            .unwrap();
        assert_eq!(report.net_gex, dec!(-12500000));

        let call = OptionContract::new(dec!(100), OptionType::Call, dec!(0.25), 5000);
        let report = AnalysisEngine::default()
            .run(&AnalysisInput::new(dec!(100), vec![call, put]))
            .unwrap();
        assert_eq!(report.net_gex, Decimal::ZERO);
        assert_eq!(report.gex_long, dec!(12500000));
        assert_eq!(report.gex_short, dec!(12500000));
    }

    #[test]
    fn test_scenario_c_rising_series() {
        let input = AnalysisInput::new(dec!(105), chain()).with_bars(rising_bars(6));
        let report = AnalysisEngine::default().run(&input).unwrap();

        assert!(report
            .patterns
            .iter()
            .any(|p| p.pattern_type == PatternType::Uptrend));
        assert_eq!(report.regimes.last().unwrap().regime_type, RegimeType::Bull);
    }

    #[test]
    fn test_scenario_d_empty_chain() {
        let report = AnalysisEngine::default()
            .run(&AnalysisInput::new(dec!(100), vec![]))
            .unwrap();

        assert_eq!(report.net_gex, Decimal::ZERO);
        assert!(report.gex_levels.is_empty());
        assert!(report.structural_levels.is_empty());
        assert!(report.patterns.is_empty());
        assert_eq!(report.regimes.len(), 1);
        assert_eq!(report.regimes[0].confidence, 0.0);
        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.signals[0].direction, Direction::Neutral);
        assert_eq!(report.signals[0].confidence, 0.1);
        assert_eq!(report.evaluation.total_signals, 0);
    }

    #[test]
    fn test_wall_and_pin_reach_signals() {
        let mut chain = vec![
            OptionContract::new(dec!(95), OptionType::Call, dec!(0.01), 100),
            OptionContract::new(dec!(100), OptionType::Call, dec!(0.45), 25000),
            OptionContract::new(dec!(105), OptionType::Call, dec!(0.01), 100),
            OptionContract::new(dec!(110), OptionType::Call, dec!(0.01), 100),
        ];
        chain.push(OptionContract::new(dec!(100), OptionType::Put, dec!(0.001), 25000));

        let report = AnalysisEngine::default()
            .run(&AnalysisInput::new(dec!(120), chain))
            .unwrap();

        assert_eq!(report.barriers.walls.len(), 1);
        assert!(report.barriers.pin_risk.as_ref().unwrap().flagged);
        assert_eq!(report.signals.len(), 3);
        assert!(report
            .signals
            .iter()
            .any(|s| s.direction == Direction::Long && s.reason.starts_with("Gamma wall at 100")));
        assert!(report
            .signals
            .iter()
            .any(|s| s.direction == Direction::Neutral && s.reason.starts_with("Pin risk at 100")));
        assert!(report
            .patterns
            .iter()
            .any(|p| p.reference == PatternReference::Strike(dec!(100))));
        // Composite and wall signals; the pin alert has no stop or target
        assert_eq!(report.evaluation.total_signals, 2);
    }

    #[test]
    fn test_net_gex_equals_call_plus_put() {
        let report = AnalysisEngine::default()
            .run(&AnalysisInput::new(dec!(100), chain()))
            .unwrap();
        let calls: Decimal = report.gex_levels.iter().map(|l| l.call_gex).sum();
        let puts: Decimal = report.gex_levels.iter().map(|l| l.put_gex).sum();
        assert_eq!(report.net_gex, calls + puts);
    }

    #[test]
    fn test_identical_input_identical_report() {
        let input = AnalysisInput::new(dec!(102), chain()).with_bars(rising_bars(30));
        let engine = AnalysisEngine::default();

        let first = serde_json::to_string(&engine.run(&input).unwrap()).unwrap();
        let second = serde_json::to_string(&engine.run(&input).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_bars_fail_fast() {
        let mut bars = rising_bars(6);
        bars[3].high = bars[3].close - dec!(0.1);
        let input = AnalysisInput::new(dec!(100), chain()).with_bars(bars);

        let err = AnalysisEngine::default().run(&input).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn test_gamma_resolved_from_iv_with_dates() {
        let contract = OptionContract::from_iv(dec!(100), OptionType::Call, 0.2, 1000);
        let valuation = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let expiration = chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let input = AnalysisInput::new(dec!(100), vec![contract]).with_dates(valuation, expiration);

        let report = AnalysisEngine::default().run(&input).unwrap();
        assert!((report.time_to_expiry - 365.0 / 365.0).abs() < 1e-12);
        assert!(report.contracts[0].gamma > Decimal::ZERO);
        assert!(report.net_gex > Decimal::ZERO);
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AnalysisEngine>();
    }
}
