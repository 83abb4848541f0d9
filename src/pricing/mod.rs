//! Option pricing primitives.
//!
//! - `black_scholes`: European price and Greeks for a single contract
//! - `implied_vol`: Newton-Raphson implied-volatility solver

mod black_scholes;
mod implied_vol;

pub use black_scholes::{year_fraction, BlackScholes, Greeks, PricingInputs};
pub use implied_vol::ImpliedVolSolver;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    #[serde(alias = "C", alias = "call", alias = "Call")]
    Call,
    #[serde(alias = "P", alias = "put", alias = "Put")]
    Put,
}

impl OptionType {
    /// Dealer hedging sign: calls add exposure, puts subtract it.
    pub fn sign(self) -> i32 {
        match self {
            OptionType::Call => 1,
            OptionType::Put => -1,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "CALL"),
            OptionType::Put => write!(f, "PUT"),
        }
    }
}

impl FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CALL" | "C" => Ok(OptionType::Call),
            "PUT" | "P" => Ok(OptionType::Put),
            other => Err(format!("unknown option type '{other}'")),
        }
    }
}
