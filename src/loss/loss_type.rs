use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::MlpError;
use crate::loss::{bce::LogLoss, cross_entropy::CrossEntropyLoss, mse::SquareLoss};
use crate::math::matrix::{MatMut, MatRef};

/// Batch loss contract.
///
/// `loss` returns the scalar loss averaged over `n_samples` and writes the
/// gradient with respect to `y_pred` (also divided by `n_samples`) into
/// `grad`. A loss whose gradient is already expressed with respect to the
/// pre-activation of its paired output activation reports it through
/// `absorbs_activation_grad`, and the engine then skips the output layer's
/// activation derivative.
pub trait Loss: fmt::Debug + Send + Sync {
    fn loss(&self, y_true: MatRef<'_>, y_pred: MatRef<'_>, grad: MatMut<'_>, n_samples: usize)
        -> f64;

    fn absorbs_activation_grad(&self) -> bool {
        false
    }

    fn name(&self) -> &str;
}

/// A user-supplied loss plugged into the built-in selection.
#[derive(Debug, Clone)]
pub struct CustomLoss(pub Arc<dyn Loss>);

/// Selects which loss function the output layer uses.
///
/// - `Square`: `0.5 * mean((p - y)²)`; pair with Identity output.
/// - `Log`: Bernoulli log-loss over independent outputs, gradient `p - y`
///   against the logistic pre-activation. With a single output column it
///   resolves to `CrossEntropy`.
/// - `CrossEntropy`: Bernoulli log-loss summed over outputs with the combined
///   logistic+loss gradient `p - y`.
///
/// `Log` and `CrossEntropy` force a logistic output layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LossFunction {
    Square,
    Log,
    CrossEntropy,
    #[serde(skip)]
    Custom(CustomLoss),
}

impl LossFunction {
    pub fn custom(loss: impl Loss + 'static) -> Self {
        LossFunction::Custom(CustomLoss(Arc::new(loss)))
    }

    /// The loss actually used for an output layer of `n_outputs` columns.
    pub fn resolve(&self, n_outputs: usize) -> LossFunction {
        match self {
            LossFunction::Log if n_outputs == 1 => LossFunction::CrossEntropy,
            other => other.clone(),
        }
    }

    pub fn requires_logistic_output(&self) -> bool {
        matches!(self, LossFunction::Log | LossFunction::CrossEntropy)
    }
}

impl Loss for LossFunction {
    fn loss(
        &self,
        y_true: MatRef<'_>,
        y_pred: MatRef<'_>,
        grad: MatMut<'_>,
        n_samples: usize,
    ) -> f64 {
        match self {
            LossFunction::Square => SquareLoss.loss(y_true, y_pred, grad, n_samples),
            LossFunction::Log => LogLoss.loss(y_true, y_pred, grad, n_samples),
            LossFunction::CrossEntropy => CrossEntropyLoss.loss(y_true, y_pred, grad, n_samples),
            LossFunction::Custom(CustomLoss(inner)) => inner.loss(y_true, y_pred, grad, n_samples),
        }
    }

    fn absorbs_activation_grad(&self) -> bool {
        match self {
            LossFunction::Square => SquareLoss.absorbs_activation_grad(),
            LossFunction::Log => LogLoss.absorbs_activation_grad(),
            LossFunction::CrossEntropy => CrossEntropyLoss.absorbs_activation_grad(),
            LossFunction::Custom(CustomLoss(inner)) => inner.absorbs_activation_grad(),
        }
    }

    fn name(&self) -> &str {
        match self {
            LossFunction::Square => "square",
            LossFunction::Log => "log",
            LossFunction::CrossEntropy => "cross-entropy",
            LossFunction::Custom(CustomLoss(inner)) => inner.name(),
        }
    }
}

impl Default for LossFunction {
    fn default() -> Self {
        LossFunction::Square
    }
}

impl FromStr for LossFunction {
    type Err = MlpError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "square" => Ok(LossFunction::Square),
            "log" => Ok(LossFunction::Log),
            "cross-entropy" => Ok(LossFunction::CrossEntropy),
            other => Err(MlpError::config(format!("unknown loss {other:?}"))),
        }
    }
}

impl fmt::Display for LossFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_resolves_to_cross_entropy_for_one_output() {
        assert!(matches!(LossFunction::Log.resolve(1), LossFunction::CrossEntropy));
        assert!(matches!(LossFunction::Log.resolve(3), LossFunction::Log));
        assert!(matches!(LossFunction::Square.resolve(1), LossFunction::Square));
    }

    #[test]
    fn parses_known_names_only() {
        assert!(matches!("cross-entropy".parse::<LossFunction>(), Ok(LossFunction::CrossEntropy)));
        assert!(matches!(
            "hinge".parse::<LossFunction>(),
            Err(MlpError::Configuration(_))
        ));
    }
}
