//! Analysis request and report records.

use crate::error::{AnalysisError, Result};
use crate::gex::{BarrierReport, ContractExposure, GexLevel, OptionContract, StructuralLevels};
use crate::market::{validate_bars, OhlcBar, Pattern, Regime};
use crate::pricing::year_fraction;
use crate::strategy::{Signal, SignalSummary};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Everything one analysis run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub spot: Decimal,
    #[serde(default)]
    pub contracts: Vec<OptionContract>,
    /// Chronological bars; only the pattern, regime and signal stages use them
    #[serde(default)]
    pub bars: Vec<OhlcBar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
}

impl AnalysisInput {
    pub fn new(spot: Decimal, contracts: Vec<OptionContract>) -> Self {
        Self {
            spot,
            contracts,
            bars: Vec::new(),
            valuation_date: None,
            expiration_date: None,
        }
    }

    pub fn with_bars(mut self, bars: Vec<OhlcBar>) -> Self {
        self.bars = bars;
        self
    }

    pub fn with_dates(mut self, valuation: NaiveDate, expiration: NaiveDate) -> Self {
        self.valuation_date = Some(valuation);
        self.expiration_date = Some(expiration);
        self
    }

    /// Reject malformed input before any stage runs.
    pub fn validate(&self) -> Result<()> {
        if self.spot <= Decimal::ZERO {
            return Err(AnalysisError::invalid(format!(
                "spot must be positive (got {})",
                self.spot
            )));
        }
        for contract in &self.contracts {
            contract.validate()?;
        }
        validate_bars(&self.bars)?;
        self.time_to_expiry().map(|_| ())
    }

    /// Year fraction between the two dates, when both are given.
    pub fn time_to_expiry(&self) -> Result<Option<f64>> {
        match (self.valuation_date, self.expiration_date) {
            (Some(valuation), Some(expiration)) => year_fraction(valuation, expiration).map(Some),
            (None, None) => Ok(None),
            _ => Err(AnalysisError::invalid(
                "valuation_date and expiration_date must be given together",
            )),
        }
    }
}

/// Output of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub spot: Decimal,
    pub time_to_expiry: f64,
    pub gex_levels: Vec<GexLevel>,
    pub contracts: Vec<ContractExposure>,
    pub net_gex: Decimal,
    pub gex_long: Decimal,
    pub gex_short: Decimal,
    pub structural_levels: StructuralLevels,
    pub barriers: BarrierReport,
    pub patterns: Vec<Pattern>,
    pub regimes: Vec<Regime>,
    pub signals: Vec<Signal>,
    pub evaluation: SignalSummary,
}
