//! Planned reward/risk summary of emitted signals.

use super::synthesizer::{Direction, Signal};
use crate::utils::decimal::to_f64;
use crate::utils::stats::mean;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregate view over directional signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    // Counts
    /// Directional signals considered
    pub total_signals: usize,
    /// Signals whose target lies on the profitable side of entry
    pub wins: usize,
    pub losses: usize,
    /// wins / total (0 when empty)
    pub win_rate: f64,

    // Returns
    /// Mean planned return, fraction of entry
    pub avg_return: f64,
    /// Sum of planned returns
    pub total_return: f64,
    /// Mean |target - entry| / |entry - stop|
    pub avg_reward_risk: f64,
}

pub struct SignalEvaluator;

impl SignalEvaluator {
    /// Summarise LONG/SHORT signals. NEUTRAL signals and signals without a
    /// stop or target are skipped.
    pub fn evaluate(signals: &[Signal]) -> SignalSummary {
        let mut returns = Vec::new();
        let mut ratios = Vec::new();

        for signal in signals {
            let (Some(stop), Some(target)) = (signal.stop_loss, signal.take_profit) else {
                continue;
            };
            let Some(planned) = planned_return(signal.direction, signal.entry_price, target) else {
                continue;
            };
            returns.push(planned);

            let risk = (signal.entry_price - stop).abs();
            if risk > Decimal::ZERO {
                ratios.push(to_f64((target - signal.entry_price).abs() / risk));
            }
        }

        if returns.is_empty() {
            return SignalSummary::default();
        }

        let wins = returns.iter().filter(|r| **r > 0.0).count();
        let total_signals = returns.len();

        SignalSummary {
            total_signals,
            wins,
            losses: total_signals - wins,
            win_rate: wins as f64 / total_signals as f64,
            avg_return: mean(&returns),
            total_return: returns.iter().sum(),
            avg_reward_risk: mean(&ratios),
        }
    }
}

/// Target move relative to entry, signed so a favourable move is positive.
fn planned_return(direction: Direction, entry: Decimal, target: Decimal) -> Option<f64> {
    if entry <= Decimal::ZERO {
        return None;
    }
    let change = to_f64((target - entry) / entry);
    match direction {
        Direction::Long => Some(change),
        Direction::Short => Some(-change),
        Direction::Neutral => None,
    }
}
