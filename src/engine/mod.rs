//! Analysis orchestration.
//!
//! - `AnalysisInput` / `AnalysisReport` records
//! - `AnalysisEngine`: validate, aggregate, scan, detect, classify, synthesize

mod input;
mod pipeline;

pub use input::{AnalysisInput, AnalysisReport};
pub use pipeline::AnalysisEngine;
