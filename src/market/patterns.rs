//! Sliding-window pattern recognition over OHLC bars.

use super::bar::OhlcBar;
use crate::config::PatternConfig;
use crate::gex::GammaWall;
use crate::utils::decimal::{from_f64, to_f64};
use crate::utils::stats::{mean, unit};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum series length for any pattern.
const MIN_BARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternType {
    Resistance,
    Support,
    Uptrend,
    Downtrend,
    Ranging,
    VolatilitySpike,
}

/// What a pattern is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PatternReference {
    Bar(usize),
    Strike(Decimal),
}

impl PatternReference {
    pub fn bar_index(&self) -> Option<usize> {
        match self {
            PatternReference::Bar(idx) => Some(*idx),
            PatternReference::Strike(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    /// 0-100
    pub strength: f64,
    /// 0-1
    pub confidence: f64,
    pub reference: PatternReference,
    /// Price level the pattern formed against, when it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Decimal>,
    pub description: String,
}

/// Detects support/resistance, trend and volatility patterns.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    config: PatternConfig,
}

impl PatternDetector {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Lazily scan the series. The returned iterator is finite and can be
    /// cloned to restart from the same position.
    pub fn scan<'a>(&'a self, bars: &'a [OhlcBar]) -> PatternScan<'a> {
        let stage = if bars.len() < MIN_BARS {
            Stage::Done
        } else {
            Stage::Levels
        };
        PatternScan {
            config: &self.config,
            bars,
            cursor: self.config.window.max(1),
            stage,
            pending: None,
        }
    }

    /// All patterns, most confident first (stable for equal confidence).
    pub fn detect(&self, bars: &[OhlcBar]) -> Vec<Pattern> {
        let mut patterns: Vec<Pattern> = self.scan(bars).collect();
        patterns.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        debug!(bars = bars.len(), patterns = patterns.len(), "Pattern scan complete");
        patterns
    }
}

/// Gamma walls as strike-anchored levels: resistance above spot, support
/// at or below it.
pub fn wall_patterns(walls: &[GammaWall], spot: Decimal) -> Vec<Pattern> {
    walls
        .iter()
        .map(|wall| {
            let pattern_type = if wall.strike > spot {
                PatternType::Resistance
            } else {
                PatternType::Support
            };
            Pattern {
                pattern_type,
                strength: wall.confidence() * 100.0,
                confidence: wall.confidence(),
                reference: PatternReference::Strike(wall.strike),
                level: Some(wall.strike),
                description: format!("Gamma wall at {} ({:.1}x mean |GEX|)", wall.strike, wall.strength),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Levels,
    Trend,
    Spike,
    Done,
}

/// Iterator over detected patterns in scan order: per-bar levels, then the
/// trend, then a volatility spike.
#[derive(Debug, Clone)]
pub struct PatternScan<'a> {
    config: &'a PatternConfig,
    bars: &'a [OhlcBar],
    cursor: usize,
    stage: Stage,
    pending: Option<Pattern>,
}

impl Iterator for PatternScan<'_> {
    type Item = Pattern;

    fn next(&mut self) -> Option<Pattern> {
        loop {
            if let Some(pattern) = self.pending.take() {
                return Some(pattern);
            }

            match self.stage {
                Stage::Levels => {
                    if self.cursor >= self.bars.len() {
                        self.stage = Stage::Trend;
                        continue;
                    }
                    let idx = self.cursor;
                    self.cursor += 1;

                    let resistance = self.resistance_at(idx);
                    let support = self.support_at(idx);
                    match (resistance, support) {
                        (Some(r), s) => {
                            self.pending = s;
                            return Some(r);
                        }
                        (None, Some(s)) => return Some(s),
                        (None, None) => continue,
                    }
                }
                Stage::Trend => {
                    self.stage = Stage::Spike;
                    if let Some(pattern) = self.trend() {
                        return Some(pattern);
                    }
                }
                Stage::Spike => {
                    self.stage = Stage::Done;
                    if let Some(pattern) = self.volatility_spike() {
                        return Some(pattern);
                    }
                }
                Stage::Done => return None,
            }
        }
    }
}

impl PatternScan<'_> {
    fn lookback(&self, idx: usize) -> &[OhlcBar] {
        &self.bars[idx - self.config.window.max(1)..idx]
    }

    /// Close pressing against the highest high of the preceding window.
    fn resistance_at(&self, idx: usize) -> Option<Pattern> {
        let recent_high = self.lookback(idx).iter().map(|b| b.high).max()?;
        let high = to_f64(recent_high);
        let close = to_f64(self.bars[idx].close);
        let band = self.config.level_band;

        if high <= 0.0 || close <= high * (1.0 - band) {
            return None;
        }

        let ratio = close / high;
        Some(Pattern {
            pattern_type: PatternType::Resistance,
            strength: ((ratio - 1.0) * 100.0).clamp(0.0, 100.0),
            confidence: unit(1.0 - (ratio - 1.0).abs() / band),
            reference: PatternReference::Bar(idx),
            level: Some(recent_high),
            description: format!("Resistance near {recent_high}"),
        })
    }

    /// Close pressing against the lowest low of the preceding window.
    fn support_at(&self, idx: usize) -> Option<Pattern> {
        let recent_low = self.lookback(idx).iter().map(|b| b.low).min()?;
        let low = to_f64(recent_low);
        let close = to_f64(self.bars[idx].close);
        let band = self.config.level_band;

        if low <= 0.0 || close >= low * (1.0 + band) {
            return None;
        }

        let ratio = close / low;
        Some(Pattern {
            pattern_type: PatternType::Support,
            strength: ((1.0 - ratio) * 100.0).clamp(0.0, 100.0),
            confidence: unit(1.0 - (ratio - 1.0).abs() / band),
            reference: PatternReference::Bar(idx),
            level: Some(recent_low),
            description: format!("Support near {recent_low}"),
        })
    }

    /// Last close against the first close of the trailing span.
    fn trend(&self) -> Option<Pattern> {
        let span = self.config.trend_span.max(2);
        let n = self.bars.len();
        if n < span {
            return None;
        }

        let first = to_f64(self.bars[n - span].close);
        let last = to_f64(self.bars[n - 1].close);
        let change = last / first - 1.0;

        let (pattern_type, description) = if change.abs() <= self.config.trend_epsilon {
            (PatternType::Ranging, "Flat over trend span".to_string())
        } else if change > 0.0 {
            (PatternType::Uptrend, format!("Uptrend {:+.2}% over {span} bars", change * 100.0))
        } else {
            (PatternType::Downtrend, format!("Downtrend {:+.2}% over {span} bars", change * 100.0))
        };

        Some(Pattern {
            pattern_type,
            strength: (change.abs() * 100.0).clamp(0.0, 100.0),
            confidence: self.config.trend_confidence,
            reference: PatternReference::Bar(n - 1),
            level: None,
            description,
        })
    }

    /// Recent average true range well above the series average.
    fn volatility_spike(&self) -> Option<Pattern> {
        let window = self.config.spike_window.max(1);
        let ranges: Vec<f64> = self
            .bars
            .windows(2)
            .map(|pair| to_f64(pair[1].true_range(Some(pair[0].close))))
            .collect();
        if ranges.len() <= window {
            return None;
        }

        let historical = mean(&ranges);
        let recent = mean(&ranges[ranges.len() - window..]);
        if historical <= 0.0 || recent <= historical * self.config.spike_multiple {
            return None;
        }

        let ratio = recent / historical;
        Some(Pattern {
            pattern_type: PatternType::VolatilitySpike,
            strength: ((ratio - 1.0) * 100.0).clamp(0.0, 100.0),
            confidence: self.config.spike_confidence,
            reference: PatternReference::Bar(self.bars.len() - 1),
            level: Some(from_f64(recent)),
            description: format!("Average true range {ratio:.2}x its series mean"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(close: Decimal) -> OhlcBar {
        OhlcBar::new(close, close + dec!(0.5), close - dec!(0.5), close, dec!(1000))
    }

    fn detector() -> PatternDetector {
        PatternDetector::new(&PatternConfig::default())
    }

    #[test]
    fn test_wall_patterns_anchor_to_strike() {
        let walls = vec![
            GammaWall {
                strike: dec!(95),
                net_gex: dec!(-4000),
                strength: 3.0,
            },
            GammaWall {
                strike: dec!(110),
                net_gex: dec!(9000),
                strength: 6.0,
            },
        ];
        let patterns = wall_patterns(&walls, dec!(100));

        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].pattern_type, PatternType::Support);
        assert_eq!(patterns[0].reference, PatternReference::Strike(dec!(95)));
        assert!(patterns[0].reference.bar_index().is_none());
        assert!((patterns[0].confidence - 0.6).abs() < 1e-12);
        assert_eq!(patterns[1].pattern_type, PatternType::Resistance);
        assert_eq!(patterns[1].confidence, 1.0);
        assert_eq!(patterns[1].strength, 100.0);
    }

    #[test]
    fn test_single_bar_yields_nothing() {
        let bars = vec![bar(dec!(100))];
        assert!(detector().detect(&bars).is_empty());
        assert!(detector().detect(&[]).is_empty());
    }

    #[test]
    fn test_uptrend_on_rising_closes() {
        let bars: Vec<OhlcBar> = (0..6).map(|i| bar(dec!(100) + Decimal::from(i))).collect();
        let patterns = detector().detect(&bars);

        let trend = patterns
            .iter()
            .find(|p| matches!(p.pattern_type, PatternType::Uptrend | PatternType::Downtrend | PatternType::Ranging))
            .unwrap();
        assert_eq!(trend.pattern_type, PatternType::Uptrend);
        assert_eq!(trend.reference, PatternReference::Bar(5));
    }

    #[test]
    fn test_downtrend_and_flat() {
        let falling: Vec<OhlcBar> = (0..5).map(|i| bar(dec!(100) - Decimal::from(i))).collect();
        let trend = detector()
            .scan(&falling)
            .find(|p| p.pattern_type == PatternType::Downtrend);
        assert!(trend.is_some());

        let flat: Vec<OhlcBar> = (0..5).map(|_| bar(dec!(100))).collect();
        let trend = detector().scan(&flat).find(|p| p.pattern_type == PatternType::Ranging);
        assert_eq!(trend.unwrap().strength, 0.0);
    }

    #[test]
    fn test_resistance_near_recent_high() {
        // Five bars topping at 100.5, then a close right at that high
        let mut bars: Vec<OhlcBar> = (0..5).map(|_| bar(dec!(100))).collect();
        bars.push(OhlcBar::new(dec!(100), dec!(100.6), dec!(99.9), dec!(100.5), dec!(1000)));

        let resistance: Vec<Pattern> = detector()
            .scan(&bars)
            .filter(|p| p.pattern_type == PatternType::Resistance)
            .collect();
        assert_eq!(resistance.len(), 1);
        assert_eq!(resistance[0].level, Some(dec!(100.5)));
        assert_eq!(resistance[0].reference, PatternReference::Bar(5));
        assert!((resistance[0].confidence - 1.0).abs() < 1e-12);
        assert!(resistance[0].strength.abs() < 1e-12);
    }

    #[test]
    fn test_support_strength_scales_with_break() {
        let mut bars: Vec<OhlcBar> = (0..5).map(|_| bar(dec!(100))).collect();
        // Close 2% under the recent low of 99.5
        bars.push(OhlcBar::new(dec!(99), dec!(99.2), dec!(97.4), dec!(97.51), dec!(1000)));

        let support = detector()
            .scan(&bars)
            .find(|p| p.pattern_type == PatternType::Support)
            .unwrap();
        assert!((support.strength - 2.0).abs() < 1e-9);
        assert!((support.confidence - 0.6).abs() < 1e-9);
        assert_eq!(support.level, Some(dec!(99.5)));
    }

    #[test]
    fn test_volatility_spike() {
        let calm: Vec<OhlcBar> = (0..11)
            .map(|_| OhlcBar::new(dec!(100), dec!(100.5), dec!(99.5), dec!(100), dec!(1)))
            .collect();
        let wild: Vec<OhlcBar> = (0..10)
            .map(|_| OhlcBar::new(dec!(100), dec!(102.5), dec!(97.5), dec!(100), dec!(1)))
            .collect();
        let bars: Vec<OhlcBar> = calm.into_iter().chain(wild).collect();

        let spike = detector()
            .scan(&bars)
            .find(|p| p.pattern_type == PatternType::VolatilitySpike)
            .unwrap();
        assert_eq!(spike.confidence, 0.7);
        assert_eq!(spike.reference, PatternReference::Bar(20));

        let calm_only: Vec<OhlcBar> = (0..21)
            .map(|_| OhlcBar::new(dec!(100), dec!(100.5), dec!(99.5), dec!(100), dec!(1)))
            .collect();
        assert!(detector()
            .scan(&calm_only)
            .all(|p| p.pattern_type != PatternType::VolatilitySpike));
    }

    #[test]
    fn test_scan_is_restartable() {
        let bars: Vec<OhlcBar> = (0..12).map(|i| bar(dec!(100) + Decimal::from(i % 3))).collect();
        let det = detector();
        let scan = det.scan(&bars);
        let first: Vec<Pattern> = scan.clone().collect();
        let second: Vec<Pattern> = scan.collect();
        assert_eq!(first, second);
        assert_eq!(first, det.scan(&bars).collect::<Vec<_>>());
    }

    #[test]
    fn test_detect_sorted_by_confidence() {
        let bars: Vec<OhlcBar> = (0..12).map(|i| bar(dec!(100) + Decimal::from(i % 4))).collect();
        let patterns = detector().detect(&bars);
        assert!(patterns
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
    }
}
