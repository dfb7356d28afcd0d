use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used across the crate.
pub type Result<T> = std::result::Result<T, MlpError>;

/// Everything that can stop a fit.
///
/// A stall (no progress for `max_epoch_without_progress` epochs) is not an
/// error; it is reported through `FitReport::stalled`.
#[derive(Debug, Clone, PartialEq)]
pub enum MlpError {
    /// Unknown activation/loss/solver name or an invalid hyperparameter.
    Configuration(String),
    /// Two matrices that must agree on a dimension do not.
    DimensionMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A NaN or infinity showed up in a loss, gradient or weight.
    NumericalInstability { what: &'static str, epoch: usize },
    /// The full-batch minimizer gave up. The network keeps the best
    /// parameters the minimizer reported.
    ExternalOptimizer(String),
}

impl MlpError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        MlpError::Configuration(msg.into())
    }
}

impl Display for MlpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlpError::Configuration(msg) => write!(f, "invalid configuration: {msg}"),
            MlpError::DimensionMismatch {
                what,
                got,
                expected,
            } => write!(f, "dimension mismatch for {what}: got {got}, expected {expected}"),
            MlpError::NumericalInstability { what, epoch } => {
                write!(f, "non-finite {what} at epoch {epoch}")
            }
            MlpError::ExternalOptimizer(msg) => write!(f, "minimizer failed: {msg}"),
        }
    }
}

impl Error for MlpError {}
