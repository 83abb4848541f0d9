//! # GEX Analyzer
//!
//! Dealer gamma exposure analysis for option chains, combined with
//! price-action patterns and market regime into trade signals.
//!
//! ## Architecture
//!
//! - `config`: Layered configuration and validation
//! - `pricing`: Black-Scholes pricing, Greeks and implied volatility
//! - `gex`: Per-strike gamma exposure, structural levels and barriers
//! - `market`: OHLC bars, pattern detection and regime classification
//! - `strategy`: Signal synthesis and reward/risk evaluation
//! - `engine`: Input validation and the end-to-end analysis pipeline
//! - `data`: CSV/JSON ingestion with column aliasing
//! - `error`: Library error taxonomy
//! - `utils`: Decimal and statistics helpers

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod gex;
pub mod market;
pub mod pricing;
pub mod strategy;
pub mod utils;

pub use config::Config;
pub use engine::{AnalysisEngine, AnalysisInput, AnalysisReport};
pub use error::AnalysisError;
