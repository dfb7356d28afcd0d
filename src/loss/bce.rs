use crate::loss::cross_entropy::bernoulli_term;
use crate::loss::loss_type::Loss;
use crate::math::matrix::{MatMut, MatRef};

/// Bernoulli log-loss over independent logistic outputs.
///
/// The output layer is always logistic under this loss, so the gradient is
/// written against the pre-activation as `(p - y) / n` and never divides by
/// `p (1 - p)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLoss;

impl Loss for LogLoss {
    /// Scalar: -Σ [y ln p + (1-y) ln(1-p)] / n
    /// Per-output gradient: (p - y) / n
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
                let (p, y) = (p_row[j], y_row[j]);
                sum += bernoulli_term(p, y);
                *g = (p - y) / n;
            }
        }
        sum / n
    }

    fn absorbs_activation_grad(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::layers::dense::Layer;
    use crate::loss::cross_entropy::CrossEntropyLoss;
    use crate::loss::loss_type::LossFunction;
    use crate::math::matrix::Matrix;
    use crate::network::params::plan;

    #[test]
    fn matches_cross_entropy_value_and_gradient() {
        let y = Matrix::from_data(vec![vec![1.0, 0.0, 1.0]]);
        let p = Matrix::from_data(vec![vec![0.6, 0.2, 0.9]]);
        let mut g_log = Matrix::zeros(1, 3);
        let mut g_ce = Matrix::zeros(1, 3);
        let j_log = LogLoss.loss(y.view(), p.view(), g_log.view_mut(), 4);
        let j_ce = CrossEntropyLoss.loss(y.view(), p.view(), g_ce.view_mut(), 4);
        assert!((j_log - j_ce).abs() < 1e-12);
        assert_eq!(g_log.data, g_ce.data);
        assert!(LogLoss.absorbs_activation_grad());
    }

    #[test]
    fn saturated_wrong_output_still_gets_a_gradient() {
        // z = 40 pushes both logistic outputs to exactly 1.0 against 0 targets.
        let range = plan(1, &[], 2)[0];
        let mut layer = Layer::new(range, ActivationFunction::Logistic, None);
        let x1 = Matrix::from_data(vec![vec![1.0, 1.0]]);
        let theta = Matrix::from_data(vec![vec![0.0, 0.0], vec![40.0, 40.0]]);
        layer.forward(x1.view(), theta.view());
        assert_eq!(layer.y_pred().at(0, 0), 1.0);

        let y = Matrix::zeros(1, 2);
        layer.output_error(y.view(), &LossFunction::Log, 1);
        let mut grad = Matrix::zeros(2, 2);
        layer.weight_gradient(x1.view(), grad.view_mut());
        assert_eq!(grad.data, vec![1.0, 1.0, 1.0, 1.0]);
    }
}
