//! Rolling-window market regime classification.

use super::bar::OhlcBar;
use crate::config::RegimeConfig;
use crate::error::{AnalysisError, Result};
use crate::utils::decimal::to_f64;
use crate::utils::stats::{mean, std_dev, unit};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Bars needed before any statistics are meaningful.
pub const MIN_REGIME_BARS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegimeType {
    Bull,
    Bear,
    Ranging,
    Transition,
}

impl fmt::Display for RegimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegimeType::Bull => "Bull",
            RegimeType::Bear => "Bear",
            RegimeType::Ranging => "Ranging",
            RegimeType::Transition => "Transition",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regime {
    #[serde(rename = "type")]
    pub regime_type: RegimeType,
    pub confidence: f64,
    pub avg_return: f64,
    pub volatility: f64,
    pub avg_volume: f64,
    pub start_index: usize,
    pub end_index: usize,
}

impl Regime {
    /// Placeholder regime when the series is too short to classify.
    pub fn neutral(bars: &[OhlcBar]) -> Self {
        let volumes: Vec<f64> = bars.iter().map(|b| to_f64(b.volume)).collect();
        Self {
            regime_type: RegimeType::Ranging,
            confidence: 0.0,
            avg_return: 0.0,
            volatility: 0.0,
            avg_volume: mean(&volumes),
            start_index: 0,
            end_index: bars.len().saturating_sub(1),
        }
    }
}

/// Statistics of one rolling window of returns.
#[derive(Debug, Clone, Copy)]
struct WindowStats {
    class: RegimeType,
    std: f64,
    avg_volume: f64,
}

/// Run of consecutive windows sharing a class.
#[derive(Debug, Clone, Copy)]
struct Segment {
    class: RegimeType,
    first_window: usize,
    last_window: usize,
}

impl Segment {
    fn window_count(&self) -> usize {
        self.last_window - self.first_window + 1
    }
}

#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    lookback: usize,
    return_epsilon: f64,
    std_epsilon: f64,
}

impl RegimeClassifier {
    pub fn new(config: &RegimeConfig) -> Self {
        Self {
            lookback: config.lookback.max(1),
            return_epsilon: config.return_epsilon,
            std_epsilon: config.std_epsilon,
        }
    }

    /// Classify the series, falling back to a single zero-confidence
    /// Ranging regime when there are too few bars.
    pub fn classify(&self, bars: &[OhlcBar]) -> Vec<Regime> {
        match self.try_classify(bars) {
            Ok(regimes) => regimes,
            Err(e) => {
                debug!(error = %e, "Regime classification skipped");
                vec![Regime::neutral(bars)]
            }
        }
    }

    /// Latest regime segment.
    pub fn current(&self, bars: &[OhlcBar]) -> Regime {
        self.classify(bars)
            .pop()
            .unwrap_or_else(|| Regime::neutral(bars))
    }

    /// Segmented classification; `InsufficientData` below [`MIN_REGIME_BARS`].
    pub fn try_classify(&self, bars: &[OhlcBar]) -> Result<Vec<Regime>> {
        if bars.len() < MIN_REGIME_BARS {
            return Err(AnalysisError::InsufficientData {
                detector: "regime",
                required: MIN_REGIME_BARS,
                actual: bars.len(),
            });
        }

        let closes: Vec<f64> = bars.iter().map(|b| to_f64(b.close)).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| to_f64(b.volume)).collect();
        let returns: Vec<f64> = closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect();

        let width = self.lookback.min(returns.len());
        let windows: Vec<WindowStats> = (0..=returns.len() - width)
            .map(|k| {
                let slice = &returns[k..k + width];
                WindowStats {
                    class: self.class_of(mean(slice)),
                    std: std_dev(slice),
                    // return j spans bars j and j + 1
                    avg_volume: mean(&volumes[k + 1..=k + width]),
                }
            })
            .collect();

        let mut segments = merge_windows(&windows);
        if segments.len() >= 2 {
            if let Some(last) = segments.last_mut() {
                if last.window_count() == 1 {
                    last.class = RegimeType::Transition;
                }
            }
        }

        let regimes: Vec<Regime> = segments
            .iter()
            .map(|segment| self.summarize(segment, &windows, &returns, width))
            .collect();

        debug!(
            bars = bars.len(),
            window = width,
            segments = regimes.len(),
            current = ?regimes.last().map(|r| r.regime_type),
            "Regime classification complete"
        );
        Ok(regimes)
    }

    fn class_of(&self, avg_return: f64) -> RegimeType {
        if avg_return > self.return_epsilon {
            RegimeType::Bull
        } else if avg_return < -self.return_epsilon {
            RegimeType::Bear
        } else {
            RegimeType::Ranging
        }
    }

    fn summarize(&self, segment: &Segment, windows: &[WindowStats], returns: &[f64], width: usize) -> Regime {
        let span = &returns[segment.first_window..segment.last_window + width];
        let covered = &windows[segment.first_window..=segment.last_window];

        let avg_return = mean(span);
        let std_return = std_dev(span);
        let volatility = mean(&covered.iter().map(|w| w.std).collect::<Vec<_>>());
        let avg_volume = mean(&covered.iter().map(|w| w.avg_volume).collect::<Vec<_>>());

        let volatility_score = 1.0 - (volatility * 10.0).min(1.0);
        let consistency_score = (avg_return.abs() / (std_return + self.std_epsilon)).min(1.0);

        Regime {
            regime_type: segment.class,
            confidence: unit((volatility_score + consistency_score) / 2.0),
            avg_return,
            volatility,
            avg_volume,
            // A window is dated by the bar its last return lands on
            start_index: segment.first_window + width,
            end_index: segment.last_window + width,
        }
    }
}

fn merge_windows(windows: &[WindowStats]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for (idx, window) in windows.iter().enumerate() {
        match segments.last_mut() {
            Some(current) if current.class == window.class => current.last_window = idx,
            _ => segments.push(Segment {
                class: window.class,
                first_window: idx,
                last_window: idx,
            }),
        }
    }
    segments
}
