use crate::loss::loss_type::Loss;
use crate::math::matrix::{MatMut, MatRef};

#[derive(Debug, Clone, Copy, Default)]
pub struct SquareLoss;

impl SquareLoss {
    /// Scalar loss only: `0.5 * Σ (p - y)² / n`.
    pub fn value(y_true: MatRef<'_>, y_pred: MatRef<'_>, n_samples: usize) -> f64 {
        let mut sum = 0.0;
        for i in 0..y_pred.rows() {
            sum += y_pred
                .row(i)
                .iter()
                .zip(y_true.row(i))
                .map(|(p, y)| (p - y).powi(2))
                .sum::<f64>();
        }
        0.5 * sum / n_samples as f64
    }
}

impl Loss for SquareLoss {
    /// Per-output gradient: `(p - y) / n`
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
                let diff = p_row[j] - y_row[j];
                sum += diff * diff;
                *g = diff / n;
            }
        }
        0.5 * sum / n
    }

    fn name(&self) -> &str {
        "square"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::Matrix;

    #[test]
    fn halves_the_mean_squared_error() {
        let y = Matrix::from_data(vec![vec![1.0, 0.0], vec![0.0, 0.0]]);
        let p = Matrix::from_data(vec![vec![3.0, 0.0], vec![0.0, 1.0]]);
        let mut grad = Matrix::zeros(2, 2);
        let j = SquareLoss.loss(y.view(), p.view(), grad.view_mut(), 2);
        assert!((j - 1.25).abs() < 1e-12);
        assert_eq!(grad.data, vec![1.0, 0.0, 0.0, 0.5]);
        assert!((SquareLoss::value(y.view(), p.view(), 2) - j).abs() < 1e-12);
    }
}
