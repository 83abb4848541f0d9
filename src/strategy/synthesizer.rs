//! Trade signal synthesis from gamma levels, patterns and regime.

use crate::config::SignalConfig;
use crate::gex::{BarrierReport, GammaWall, PinRisk, StructuralLevels};
use crate::market::{Pattern, Regime, RegimeType};
use crate::utils::decimal::{relative_distance, to_f64};
use crate::utils::stats::unit;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
            Direction::Neutral => "NEUTRAL",
        };
        f.write_str(name)
    }
}

/// Expected price behaviour at a nearby structural level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelReaction {
    /// Put wall below price
    Support,
    /// Call wall above price
    Resistance,
    /// Gamma flip, dealer hedging changes sign
    VolatilityExpansion,
}

impl LevelReaction {
    fn apply(self, direction: Direction) -> Direction {
        match (self, direction) {
            (LevelReaction::Support, Direction::Neutral) => Direction::Long,
            (LevelReaction::Support, Direction::Short) => Direction::Neutral,
            (LevelReaction::Resistance, Direction::Neutral) => Direction::Short,
            (LevelReaction::Resistance, Direction::Long) => Direction::Neutral,
            (_, unchanged) => unchanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    pub entry_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<LevelReaction>,
    /// Strike the signal is anchored to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Decimal>,
    pub reason: String,
}

/// Structural level close enough to spot to shape the signal.
#[derive(Debug, Clone, Copy, PartialEq)]
struct NearbyLevel {
    name: &'static str,
    strike: Decimal,
    reaction: LevelReaction,
    score: f64,
}

/// Combines the GEX picture, detected patterns and the current regime.
#[derive(Debug, Clone)]
pub struct SignalSynthesizer {
    config: SignalConfig,
}

impl SignalSynthesizer {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Build the composite signal plus one signal per gamma wall and a
    /// pin-risk alert, most confident first.
    ///
    /// The composite signal is always present. Wall and pin signals below
    /// `min_confidence` are dropped. With no structural levels and no
    /// patterns the result is a single low-confidence NEUTRAL.
    pub fn synthesize(
        &self,
        net_gex: Decimal,
        levels: &StructuralLevels,
        barriers: &BarrierReport,
        patterns: &[Pattern],
        regime: &Regime,
        spot: Decimal,
    ) -> Vec<Signal> {
        if levels.is_empty() && patterns.is_empty() {
            debug!(%spot, "No levels or patterns, emitting neutral signal");
            return vec![Signal {
                direction: Direction::Neutral,
                entry_price: spot,
                stop_loss: None,
                take_profit: None,
                confidence: self.config.degenerate_confidence,
                reaction: None,
                level: None,
                reason: "No structural levels or patterns".to_string(),
            }];
        }

        let mut signals = vec![self.composite(net_gex, levels, patterns, regime, spot)];

        let barrier_signals = barriers
            .walls
            .iter()
            .map(|wall| self.wall_signal(wall, spot))
            .chain(
                barriers
                    .pin_risk
                    .as_ref()
                    .filter(|pin| pin.flagged)
                    .map(|pin| pin_signal(pin, spot)),
            );
        for signal in barrier_signals {
            if signal.confidence >= self.config.min_confidence {
                signals.push(signal);
            } else {
                debug!(reason = %signal.reason, confidence = signal.confidence, "Barrier signal below threshold");
            }
        }

        signals.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        signals
    }

    fn composite(
        &self,
        net_gex: Decimal,
        levels: &StructuralLevels,
        patterns: &[Pattern],
        regime: &Regime,
        spot: Decimal,
    ) -> Signal {
        let base = base_direction(net_gex, regime.regime_type);
        let nearby = self.nearest_level(levels, spot);
        let direction = nearby.map_or(base, |level| level.reaction.apply(base));

        let pattern_confidence = nearest_pattern(patterns).map_or(0.0, |p| p.confidence);
        // A flip says nothing about direction, only that moves get larger
        let proximity_score = match nearby {
            Some(level) if level.reaction != LevelReaction::VolatilityExpansion => level.score,
            _ => 0.0,
        };
        let confidence = unit(
            self.config.regime_weight * regime.confidence
                + self.config.pattern_weight * pattern_confidence
                + self.config.proximity_weight * proximity_score,
        );

        let (stop_loss, take_profit) = match self.risk_levels(direction, levels, spot) {
            Some((stop, target)) => (Some(stop), Some(target)),
            None => (None, None),
        };

        let mut reason = format!(
            "Net GEX {} in {} regime",
            gex_sign(net_gex),
            regime.regime_type
        );
        if let Some(level) = nearby {
            reason.push_str(&format!(
                "; spot within band of {} {} ({:?})",
                level.name, level.strike, level.reaction
            ));
        }

        debug!(
            %direction,
            base = %base,
            confidence,
            reaction = ?nearby.map(|l| l.reaction),
            "Signal synthesized"
        );

        Signal {
            direction,
            entry_price: spot,
            stop_loss,
            take_profit,
            confidence,
            reaction: nearby.map(|l| l.reaction),
            level: nearby.map(|l| l.strike),
            reason,
        }
    }

    /// Trade toward a gamma wall: LONG on a positive wall, SHORT on a
    /// negative one. The wall is the target when it lies ahead of spot.
    fn wall_signal(&self, wall: &GammaWall, spot: Decimal) -> Signal {
        let cfg = &self.config;
        let (direction, stop, target) = if wall.net_gex > Decimal::ZERO {
            let stop = spot * (Decimal::ONE - cfg.fixed_stop_pct);
            let target = if wall.strike > spot {
                wall.strike
            } else {
                spot + cfg.reward_multiple * (spot - stop)
            };
            (Direction::Long, stop, target)
        } else {
            let stop = spot * (Decimal::ONE + cfg.fixed_stop_pct);
            let mut target = if wall.strike < spot {
                wall.strike
            } else {
                spot - cfg.reward_multiple * (stop - spot)
            };
            if target <= Decimal::ZERO {
                target = spot * (Decimal::ONE - cfg.fixed_stop_pct);
            }
            (Direction::Short, stop, target)
        };

        Signal {
            direction,
            entry_price: spot,
            stop_loss: Some(stop),
            take_profit: Some(target),
            confidence: wall.confidence(),
            reaction: None,
            level: Some(wall.strike),
            reason: format!("Gamma wall at {} ({:.1}x mean |GEX|)", wall.strike, wall.strength),
        }
    }

    /// Closest structural level inside the proximity band. Equal distances
    /// resolve in call wall, put wall, flip order.
    fn nearest_level(&self, levels: &StructuralLevels, spot: Decimal) -> Option<NearbyLevel> {
        let band = self.config.proximity_band;
        if band <= Decimal::ZERO || spot <= Decimal::ZERO {
            return None;
        }

        let candidates = [
            ("call wall", levels.call_wall, LevelReaction::Resistance),
            ("put wall", levels.put_wall, LevelReaction::Support),
            ("gamma flip", levels.gamma_flip, LevelReaction::VolatilityExpansion),
        ];

        let mut best: Option<(Decimal, NearbyLevel)> = None;
        for (name, strike, reaction) in candidates {
            let Some(strike) = strike else { continue };
            let distance = relative_distance(strike, spot);
            if distance > band {
                continue;
            }
            if best.as_ref().is_some_and(|(d, _)| *d <= distance) {
                continue;
            }
            let score = unit(1.0 - to_f64(distance / band));
            best = Some((
                distance,
                NearbyLevel {
                    name,
                    strike,
                    reaction,
                    score,
                },
            ));
        }
        best.map(|(_, level)| level)
    }

    /// Stop and target for a directional signal; `None` for NEUTRAL.
    fn risk_levels(&self, direction: Direction, levels: &StructuralLevels, spot: Decimal) -> Option<(Decimal, Decimal)> {
        let strikes = levels.distinct();
        let below = strikes.iter().rev().find(|s| **s < spot).copied();
        let above = strikes.iter().find(|s| **s > spot).copied();
        let cfg = &self.config;

        match direction {
            Direction::Neutral => None,
            Direction::Long => {
                let stop = match below {
                    Some(level) => level * (Decimal::ONE - cfg.stop_buffer),
                    None => spot * (Decimal::ONE - cfg.fixed_stop_pct),
                };
                let target = above.unwrap_or(spot + cfg.reward_multiple * (spot - stop));
                Some((stop, target))
            }
            Direction::Short => {
                let stop = match above {
                    Some(level) => level * (Decimal::ONE + cfg.stop_buffer),
                    None => spot * (Decimal::ONE + cfg.fixed_stop_pct),
                };
                let mut target = below.unwrap_or(spot - cfg.reward_multiple * (stop - spot));
                if target <= Decimal::ZERO {
                    target = spot * (Decimal::ONE - cfg.fixed_stop_pct * cfg.reward_multiple);
                }
                Some((stop, target))
            }
        }
    }
}

/// Direction implied by dealer gamma and regime agreeing.
pub fn base_direction(net_gex: Decimal, regime: RegimeType) -> Direction {
    match regime {
        RegimeType::Bull | RegimeType::Ranging if net_gex > Decimal::ZERO => Direction::Long,
        RegimeType::Bear | RegimeType::Ranging if net_gex < Decimal::ZERO => Direction::Short,
        _ => Direction::Neutral,
    }
}

/// Open-interest concentration alert. NEUTRAL, so no stop or target; the
/// pin strike rides in `level`.
fn pin_signal(pin: &PinRisk, spot: Decimal) -> Signal {
    Signal {
        direction: Direction::Neutral,
        entry_price: spot,
        stop_loss: None,
        take_profit: None,
        confidence: unit(pin.oi_ratio),
        reaction: None,
        level: Some(pin.strike),
        reason: format!(
            "Pin risk at {}: {:.1}% of open interest",
            pin.strike,
            pin.oi_ratio * 100.0
        ),
    }
}

/// Most recent bar-anchored pattern, ties to the more confident one.
fn nearest_pattern(patterns: &[Pattern]) -> Option<&Pattern> {
    patterns.iter().filter(|p| p.reference.bar_index().is_some()).max_by(|a, b| {
        a.reference
            .bar_index()
            .cmp(&b.reference.bar_index())
            .then(a.confidence.total_cmp(&b.confidence))
    })
}

fn gex_sign(net_gex: Decimal) -> &'static str {
    if net_gex > Decimal::ZERO {
        "positive"
    } else if net_gex < Decimal::ZERO {
        "negative"
    } else {
        "flat"
    }
}
