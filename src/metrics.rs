//! Scores for fitted models. Not used by training itself.

use crate::math::matrix::MatRef;

/// R² averaged uniformly over output columns.
///
/// A constant target column scores 1 when predicted exactly and 0 otherwise.
pub fn r2_score(y_true: MatRef<'_>, y_pred: MatRef<'_>) -> f64 {
    let (rows, cols) = (y_true.rows(), y_true.cols());
    if rows == 0 || cols == 0 {
        return 0.0;
    }
    let mut total = 0.0;
    for j in 0..cols {
        let mean = (0..rows).map(|i| y_true.at(i, j)).sum::<f64>() / rows as f64;
        let (mut ss_res, mut ss_tot) = (0.0, 0.0);
        for i in 0..rows {
            let y = y_true.at(i, j);
            ss_res += (y - y_pred.at(i, j)).powi(2);
            ss_tot += (y - mean).powi(2);
        }
        total += if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };
    }
    total / cols as f64
}

/// Fraction of rows where every output matches.
pub fn accuracy_score(y_true: MatRef<'_>, y_pred: MatRef<'_>) -> f64 {
    let rows = y_true.rows();
    if rows == 0 {
        return 0.0;
    }
    let correct = (0..rows).filter(|&i| y_true.row(i) == y_pred.row(i)).count();
    correct as f64 / rows as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::Matrix;

    #[test]
    fn perfect_and_mean_predictions() {
        let y = Matrix::from_data(vec![vec![1.0], vec![2.0], vec![3.0]]);
        assert_eq!(r2_score(y.view(), y.view()), 1.0);
        let mean = Matrix::from_data(vec![vec![2.0], vec![2.0], vec![2.0]]);
        assert_eq!(r2_score(y.view(), mean.view()), 0.0);
    }

    #[test]
    fn accuracy_needs_whole_row() {
        let y = Matrix::from_data(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let p = Matrix::from_data(vec![vec![1.0, 0.0], vec![1.0, 1.0]]);
        assert_eq!(accuracy_score(y.view(), p.view()), 0.5);
    }
}
