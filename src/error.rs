use thiserror::Error;

/// Errors raised by the analysis core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Input violates a hard shape or range constraint; the request is rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A detector received fewer bars than it needs. Recovered locally by the engine.
    #[error("Insufficient data for {detector}: need {required} bars, got {actual}")]
    InsufficientData {
        detector: &'static str,
        required: usize,
        actual: usize,
    },

    /// The implied-volatility solver hit its iteration cap.
    #[error("Numeric convergence failure after {iterations} iterations (last estimate {last_estimate})")]
    NumericConvergence { iterations: u32, last_estimate: f64 },
}

impl AnalysisError {
    /// Shorthand for building an [`AnalysisError::InvalidInput`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// True for errors the engine degrades instead of propagating.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
