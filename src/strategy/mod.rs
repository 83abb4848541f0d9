//! Trade signal generation.
//!
//! Contains the logic for:
//! - Combining net GEX, structural levels, patterns and regime into signals
//! - Reacting to nearby put walls, call walls and the gamma flip
//! - Summarising planned reward/risk of the emitted signals

mod evaluation;
mod synthesizer;

pub use evaluation::{SignalEvaluator, SignalSummary};
pub use synthesizer::{base_direction, Direction, LevelReaction, Signal, SignalSynthesizer};
