use rand::Rng;

use crate::{
    activation::activation::ActivationFunction,
    error::{MlpError, Result},
    layers::dense::Layer,
    math::matrix::{copy_prepend_ones, orthonormalize, MatMut, MatRef, Matrix},
    network::params::{plan, ParamArena},
    optim::solver::Solver,
};

/// A feed-forward stack of dense layers over one parameter arena.
///
/// Layer `l` owns the `(1 + outputs_{l-1}, outputs_l)` block
/// `layers[l].params()` of the arena; `flat_theta()` is every block back to
/// back, so a full-batch minimizer can work on it directly.
#[derive(Debug)]
pub struct Network {
    pub(crate) layers: Vec<Layer>,
    pub(crate) arena: ParamArena,
    pub(crate) x1: Matrix,
    n_features: usize,
}

impl Network {
    /// Allocates `n_features -> hidden... -> n_outputs`, draws every weight
    /// uniformly from `[-1, 1)` and orthonormalizes each layer's block.
    pub fn new<R: Rng + ?Sized>(
        n_features: usize,
        hidden: &[usize],
        n_outputs: usize,
        activation: &ActivationFunction,
        output_activation: &ActivationFunction,
        solver: &Solver,
        rng: &mut R,
    ) -> Result<Network> {
        if n_features == 0 || n_outputs == 0 {
            return Err(MlpError::config(format!(
                "network needs at least one input and one output, got {n_features} -> {n_outputs}"
            )));
        }
        if let Some(pos) = hidden.iter().position(|&h| h == 0) {
            return Err(MlpError::config(format!("hidden layer {pos} has no units")));
        }

        let ranges = plan(n_features, hidden, n_outputs);
        let total = ranges.iter().map(|r| r.len()).sum();
        let mut arena = ParamArena::with_len(total);

        let last = ranges.len() - 1;
        let mut layers = Vec::with_capacity(ranges.len());
        for (l, r) in ranges.into_iter().enumerate() {
            let init = Matrix::random(r.inputs, r.outputs, rng);
            let mut theta = arena.theta_mut(&r);
            theta.copy_from(init.view());
            orthonormalize(&mut theta);

            let act = if l == last {
                output_activation.clone()
            } else {
                activation.clone()
            };
            layers.push(Layer::new(r, act, solver.build_optimizer()));
        }

        Ok(Network {
            layers,
            arena,
            x1: Matrix::default(),
            n_features,
        })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, l: usize) -> &Layer {
        &self.layers[l]
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_outputs(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.outputs)
    }

    /// Total number of weights, bias rows included.
    pub fn n_params(&self) -> usize {
        self.arena.len()
    }

    pub fn flat_theta(&self) -> &[f64] {
        self.arena.flat_theta()
    }

    pub fn flat_theta_mut(&mut self) -> &mut [f64] {
        self.arena.flat_theta_mut()
    }

    pub fn flat_grad(&self) -> &[f64] {
        self.arena.flat_grad()
    }

    pub fn theta(&self, l: usize) -> MatRef<'_> {
        self.arena.theta(self.layers[l].params())
    }

    pub fn theta_mut(&mut self, l: usize) -> MatMut<'_> {
        let r = *self.layers[l].params();
        self.arena.theta_mut(&r)
    }

    pub fn grad(&self, l: usize) -> MatRef<'_> {
        self.arena.grad(self.layers[l].params())
    }

    /// Overwrites layer `l`'s weights with `theta`, bias row first.
    pub fn set_theta(&mut self, l: usize, theta: &Matrix) -> Result<()> {
        let layer = self.layers.get(l).ok_or_else(|| {
            MlpError::config(format!("layer {l} out of range ({} layers)", self.layers.len()))
        })?;
        if theta.rows != layer.inputs {
            return Err(MlpError::DimensionMismatch {
                what: "theta rows",
                got: theta.rows,
                expected: layer.inputs,
            });
        }
        if theta.cols != layer.outputs {
            return Err(MlpError::DimensionMismatch {
                what: "theta columns",
                got: theta.cols,
                expected: layer.outputs,
            });
        }
        self.theta_mut(l).copy_from(theta.view());
        Ok(())
    }

    /// Fresh optimizer state for every layer.
    pub fn reset_optimizers(&mut self, solver: &Solver) {
        for layer in &mut self.layers {
            layer.set_optimizer(solver.build_optimizer());
        }
    }

    /// `Theta *= 1 - decay` over the whole arena, bias rows included.
    pub fn decay_weights(&mut self, decay: f64) {
        let keep = 1.0 - decay;
        self.arena.flat_theta_mut().iter_mut().for_each(|t| *t *= keep);
    }

    /// Runs `x` through every layer. When `out` is given it receives a copy
    /// of the final `Ypred`.
    pub fn forward(&mut self, x: MatRef<'_>, out: Option<&mut Matrix>) -> Result<()> {
        if x.cols() != self.n_features {
            return Err(MlpError::DimensionMismatch {
                what: "X columns",
                got: x.cols(),
                expected: self.n_features,
            });
        }
        self.x1.resize(x.rows(), self.n_features + 1);
        copy_prepend_ones(x, self.x1.view_mut());

        for l in 0..self.layers.len() {
            let (before, rest) = self.layers.split_at_mut(l);
            let layer = &mut rest[0];
            let x1 = match before.last() {
                Some(prev) => prev.next_x1(),
                None => self.x1.view(),
            };
            layer.forward(x1, self.arena.theta(layer.params()));
        }

        if let Some(out) = out {
            let y_pred = self.output();
            out.resize(y_pred.rows(), y_pred.cols());
            out.view_mut().copy_from(y_pred);
        }
        Ok(())
    }

    /// The output layer's `Ypred` from the last forward pass.
    pub fn output(&self) -> MatRef<'_> {
        match self.layers.last() {
            Some(layer) => layer.y_pred(),
            None => self.x1.view(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn net(hidden: &[usize]) -> Network {
        let mut rng = StdRng::seed_from_u64(7);
        Network::new(
            3,
            hidden,
            2,
            &ActivationFunction::Tanh,
            &ActivationFunction::Identity,
            &Solver::default(),
            &mut rng,
        )
        .unwrap()
    }

    #[test]
    fn flat_length_counts_bias_rows() {
        let net = net(&[4, 5]);
        assert_eq!(net.n_params(), 4 * 4 + 5 * 5 + 6 * 2);
        assert_eq!(net.layers().len(), 3);
        assert!(net.layers().iter().all(|l| l.has_optimizer()));
    }

    #[test]
    fn set_theta_rejects_wrong_shapes() {
        let mut net = net(&[]);
        let bad = Matrix::zeros(3, 2);
        assert_eq!(
            net.set_theta(0, &bad),
            Err(MlpError::DimensionMismatch {
                what: "theta rows",
                got: 3,
                expected: 4,
            })
        );
        assert!(net.set_theta(0, &Matrix::zeros(4, 2)).is_ok());
        assert!(net.flat_theta().iter().all(|&t| t == 0.0));
    }

    #[test]
    fn forward_rejects_wrong_feature_count() {
        let mut net = net(&[2]);
        let x = Matrix::zeros(5, 4);
        assert!(matches!(
            net.forward(x.view(), None),
            Err(MlpError::DimensionMismatch { what: "X columns", .. })
        ));
    }

    #[test]
    fn zero_hidden_units_is_a_configuration_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = Network::new(
            2,
            &[3, 0],
            1,
            &ActivationFunction::ReLU,
            &ActivationFunction::ReLU,
            &Solver::default(),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, MlpError::Configuration(_)));
    }
}
