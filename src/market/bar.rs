//! OHLC bar input and validation.

use crate::error::{AnalysisError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price bar. A bar's sequence index is its position in the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Decimal,
}

impl OhlcBar {
    pub fn new(open: Decimal, high: Decimal, low: Decimal, close: Decimal, volume: Decimal) -> Self {
        Self {
            timestamp: None,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Check positivity and the high/low envelope.
    pub fn validate(&self) -> Result<()> {
        if self.open <= Decimal::ZERO
            || self.high <= Decimal::ZERO
            || self.low <= Decimal::ZERO
            || self.close <= Decimal::ZERO
        {
            return Err(AnalysisError::invalid(format!(
                "prices must be positive (o={} h={} l={} c={})",
                self.open, self.high, self.low, self.close
            )));
        }
        if self.volume < Decimal::ZERO {
            return Err(AnalysisError::invalid(format!(
                "volume cannot be negative (got {})",
                self.volume
            )));
        }
        if self.high < self.open.max(self.close) {
            return Err(AnalysisError::invalid(format!(
                "high {} below max(open {}, close {})",
                self.high, self.open, self.close
            )));
        }
        if self.low > self.open.min(self.close) {
            return Err(AnalysisError::invalid(format!(
                "low {} above min(open {}, close {})",
                self.low, self.open, self.close
            )));
        }
        Ok(())
    }

    /// Largest of high-low and the gaps from the previous close.
    pub fn true_range(&self, previous_close: Option<Decimal>) -> Decimal {
        let range = self.high - self.low;
        match previous_close {
            Some(prev) => range
                .max((self.high - prev).abs())
                .max((self.low - prev).abs()),
            None => range,
        }
    }
}

/// Validate a whole series, naming the offending bar.
pub fn validate_bars(bars: &[OhlcBar]) -> Result<()> {
    for (idx, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            AnalysisError::InvalidInput(msg) => {
                AnalysisError::InvalidInput(format!("bar {idx}: {msg}"))
            }
            other => other,
        })?;
    }
    Ok(())
}
