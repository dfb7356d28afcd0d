use crate::loss::loss_type::Loss;
use crate::math::matrix::{MatMut, MatRef};

/// Log-loss over independent logistic outputs, for one-hot (or {0,1})
/// targets. Pair with a Logistic output layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss;

/// Keeps ln() away from 0.
pub(crate) const EPS: f64 = 1e-15;

/// `-(y ln p + (1 - y) ln(1 - p))` with `p` clamped into `[EPS, 1 - EPS]`.
#[inline]
pub(crate) fn bernoulli_term(p: f64, y: f64) -> f64 {
    let p = p.clamp(EPS, 1.0 - EPS);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

impl Loss for CrossEntropyLoss {
    /// J = -Σ [y ln p + (1-y) ln(1-p)] / n
    ///
    /// The gradient written is with respect to the logistic pre-activation:
    /// composed with σ the chain rule collapses to `(p - y) / n`, which keeps
    /// the output error finite even when `p` saturates.
    fn loss(
        &self,
        y_true: MatRef<'_>,
        y_pred: MatRef<'_>,
        mut grad: MatMut<'_>,
        n_samples: usize,
    ) -> f64 {
        let n = n_samples as f64;
        let mut sum = 0.0;
        for i in 0..y_pred.rows() {
            let (p_row, y_row) = (y_pred.row(i), y_true.row(i));
            for (j, g) in grad.row_mut(i).iter_mut().enumerate() {
                sum += bernoulli_term(p_row[j], y_row[j]);
                *g = (p_row[j] - y_row[j]) / n;
            }
        }
        sum / n
    }

    fn absorbs_activation_grad(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "cross-entropy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::Matrix;

    #[test]
    fn error_signal_is_prediction_minus_target() {
        let y = Matrix::from_data(vec![vec![1.0, 0.0]]);
        let p = Matrix::from_data(vec![vec![0.8, 0.3]]);
        let mut grad = Matrix::zeros(1, 2);
        let j = CrossEntropyLoss.loss(y.view(), p.view(), grad.view_mut(), 1);
        let expected = -(0.8f64.ln()) - (0.7f64.ln());
        assert!((j - expected).abs() < 1e-12);
        assert!((grad.at(0, 0) + 0.2).abs() < 1e-12);
        assert!((grad.at(0, 1) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn saturated_predictions_stay_finite() {
        let y = Matrix::from_data(vec![vec![1.0]]);
        let p = Matrix::from_data(vec![vec![0.0]]);
        let mut grad = Matrix::zeros(1, 1);
        let j = CrossEntropyLoss.loss(y.view(), p.view(), grad.view_mut(), 1);
        assert!(j.is_finite());
        assert_eq!(grad.at(0, 0), -1.0);
    }
}
