use crate::{
    error::{MlpError, Result},
    loss::loss_type::LossFunction,
    math::matrix::{frobenius_norm, MatMut, MatRef},
    network::network::Network,
};

/// Knobs for one backward pass.
#[derive(Debug, Clone, Copy)]
pub struct BackpropOptions<'a> {
    pub loss: &'a LossFunction,
    pub alpha: f64,
    pub l1_ratio: f64,
    pub gradient_clipping: Option<f64>,
    /// `false` leaves `Theta` untouched so an external minimizer can step.
    pub apply_updates: bool,
    /// Only used to label `NumericalInstability` errors.
    pub epoch: usize,
}

impl Network {
    /// Backpropagates the last forward pass against `y`.
    ///
    /// Fills every layer's gradient in the arena, adds the elastic-net
    /// penalty, clips, and then (if `apply_updates`) lets each layer's
    /// optimizer step. Losses and penalties are divided by `n_samples`, the
    /// size of the whole training set, so minibatch losses add up to the
    /// epoch loss. Returns the output-layer loss plus penalties.
    pub fn backprop(&mut self, y: MatRef<'_>, n_samples: usize, opts: &BackpropOptions<'_>) -> Result<f64> {
        let n_layers = self.layers.len();
        let output = self.output();
        if y.rows() != output.rows() {
            return Err(MlpError::DimensionMismatch {
                what: "Y rows",
                got: y.rows(),
                expected: output.rows(),
            });
        }
        if y.cols() != output.cols() {
            return Err(MlpError::DimensionMismatch {
                what: "Y columns",
                got: y.cols(),
                expected: output.cols(),
            });
        }
        let loss = opts.loss.resolve(self.n_outputs());

        let mut j = 0.0;
        for l in (0..n_layers).rev() {
            let (before, rest) = self.layers.split_at_mut(l);
            let (current, after) = rest.split_at_mut(1);
            let layer = &mut current[0];

            match after.first() {
                None => j += layer.output_error(y, &loss, n_samples),
                Some(next) => {
                    layer.hidden_error(next.y_diff(), self.arena.theta(next.params()), n_samples)
                }
            }

            let x1 = match before.last() {
                Some(prev) => prev.next_x1(),
                None => self.x1.view(),
            };
            let r = *layer.params();
            let (theta, grad) = self.arena.theta_and_grad_mut();
            let (theta, grad) = (&theta[r.range()], &mut grad[r.range()]);
            layer.weight_gradient(x1, MatMut::new(r.inputs, r.outputs, r.outputs, grad));

            if opts.alpha > 0.0 {
                j += regularize(theta, grad, r.outputs, opts.alpha, opts.l1_ratio, n_samples);
            }
            if let Some(threshold) = opts.gradient_clipping {
                clip_gradient(grad, threshold);
            }
            if !grad.iter().all(|g| g.is_finite()) {
                return Err(MlpError::NumericalInstability {
                    what: "gradient",
                    epoch: opts.epoch,
                });
            }
        }
        if !j.is_finite() {
            return Err(MlpError::NumericalInstability {
                what: "loss",
                epoch: opts.epoch,
            });
        }

        if opts.apply_updates {
            for layer in &mut self.layers {
                let r = *layer.params();
                layer.apply_update(self.arena.layer_mut(&r));
            }
            if !self.arena.flat_theta().iter().all(|t| t.is_finite()) {
                return Err(MlpError::NumericalInstability {
                    what: "weights",
                    epoch: opts.epoch,
                });
            }
        }
        Ok(j)
    }
}

/// Elastic-net penalty on every row of `theta` but the bias row.
///
/// Adds `alpha/n * (l1_ratio * sign(θ) + (1 - l1_ratio) * θ)` to `grad` and
/// returns `alpha/n * (l1_ratio * Σ|θ| + (1 - l1_ratio)/2 * Σθ²)`.
pub fn regularize(
    theta: &[f64],
    grad: &mut [f64],
    outputs: usize,
    alpha: f64,
    l1_ratio: f64,
    n_samples: usize,
) -> f64 {
    let scale = alpha / n_samples as f64;
    let (mut l1, mut l2) = (0.0, 0.0);
    for (t, g) in theta[outputs..].iter().zip(grad[outputs..].iter_mut()) {
        l1 += t.abs();
        l2 += t * t;
        *g += scale * (l1_ratio * sign(*t) + (1.0 - l1_ratio) * t);
    }
    scale * (l1_ratio * l1 + (1.0 - l1_ratio) * 0.5 * l2)
}

/// Rescales `grad` to Frobenius norm `threshold` when it is larger.
/// Returns whether it clipped.
pub fn clip_gradient(grad: &mut [f64], threshold: f64) -> bool {
    let norm = frobenius_norm(grad);
    if norm <= threshold || threshold <= 0.0 {
        return false;
    }
    let scale = threshold / norm;
    grad.iter_mut().for_each(|g| *g *= scale);
    true
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}
