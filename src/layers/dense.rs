use crate::{
    activation::activation::{Activation, ActivationFunction},
    loss::{loss_type::Loss, loss_type::LossFunction, mse::SquareLoss},
    math::matrix::{gemm_nn, gemm_nt, gemm_tn, MatMut, MatRef, Matrix},
    network::params::{LayerParams, ParamRange},
    optim::optimizer::Optimizer,
};

/// One fully connected layer.
///
/// The weights themselves live in the network's parameter arena; the layer
/// keeps the range it owns plus the per-batch buffers of the forward and
/// backward pass. `next_x1` is `[1 | Ypred]`, so the next layer reads it as
/// its bias-augmented input and `y_pred()` is its non-bias view.
#[derive(Debug)]
pub struct Layer {
    pub inputs: usize,
    pub outputs: usize,
    params: ParamRange,
    activation: ActivationFunction,
    optimizer: Option<Box<dyn Optimizer>>,
    z: Matrix,
    next_x1: Matrix,
    y_true: Matrix,
    y_diff: Matrix,
    h_grad: Matrix,
    diagnostic_loss: f64,
}

impl Layer {
    pub fn new(
        params: ParamRange,
        activation: ActivationFunction,
        optimizer: Option<Box<dyn Optimizer>>,
    ) -> Layer {
        Layer {
            inputs: params.inputs,
            outputs: params.outputs,
            params,
            activation,
            optimizer,
            z: Matrix::default(),
            next_x1: Matrix::default(),
            y_true: Matrix::default(),
            y_diff: Matrix::default(),
            h_grad: Matrix::default(),
            diagnostic_loss: 0.0,
        }
    }

    pub fn params(&self) -> &ParamRange {
        &self.params
    }

    pub fn activation(&self) -> &ActivationFunction {
        &self.activation
    }

    pub fn has_optimizer(&self) -> bool {
        self.optimizer.is_some()
    }

    /// Replaces the optimizer, dropping any accumulated state.
    pub fn set_optimizer(&mut self, optimizer: Option<Box<dyn Optimizer>>) {
        self.optimizer = optimizer;
    }

    /// Shapes the per-batch buffers for `n` rows.
    pub fn alloc_outputs(&mut self, n: usize) {
        if self.z.rows == n && self.z.cols == self.outputs {
            return;
        }
        self.z.resize(n, self.outputs);
        self.next_x1.resize(n, self.outputs + 1);
        self.y_true.resize(n, self.outputs);
        self.y_diff.resize(n, self.outputs);
        self.h_grad.resize(n, self.outputs);
        for i in 0..n {
            self.next_x1.set(i, 0, 1.0);
        }
    }

    pub fn z(&self) -> MatRef<'_> {
        self.z.view()
    }

    pub fn y_pred(&self) -> MatRef<'_> {
        self.next_x1.view().skip_first_col()
    }

    pub fn next_x1(&self) -> MatRef<'_> {
        self.next_x1.view()
    }

    pub fn y_true(&self) -> MatRef<'_> {
        self.y_true.view()
    }

    /// The error signal in pre-activation space after `output_error` or
    /// `hidden_error`.
    pub fn y_diff(&self) -> MatRef<'_> {
        self.y_diff.view()
    }

    pub fn h_grad(&self) -> MatRef<'_> {
        self.h_grad.view()
    }

    /// Half the mean squared back-propagated error of the last backward
    /// pass. Hidden layers only; never part of the objective.
    pub fn diagnostic_loss(&self) -> f64 {
        self.diagnostic_loss
    }

    /// `Z = X1 · Theta`, `Ypred = f(Z)`.
    pub fn forward(&mut self, x1: MatRef<'_>, theta: MatRef<'_>) {
        self.alloc_outputs(x1.rows());
        gemm_nn(x1, theta, self.z.view_mut());
        self.activation
            .func(self.z.view(), self.next_x1.view_mut().skip_first_col());
    }

    /// Output-layer error: runs `loss` against the targets and leaves
    /// `dJ/dz` in `y_diff`. Returns the batch loss.
    pub fn output_error(&mut self, y: MatRef<'_>, loss: &LossFunction, n_samples: usize) -> f64 {
        self.y_true.view_mut().copy_from(y);
        let y_pred = self.next_x1.view().skip_first_col();
        let j = loss.loss(y, y_pred, self.y_diff.view_mut(), n_samples);
        if !loss.absorbs_activation_grad() {
            self.couple_activation_grad();
        }
        j
    }

    /// Hidden-layer error from the layer above:
    /// `y_diff = (next_y_diff · next_theta[1..]ᵀ) ⊙ f'(Z)`.
    pub fn hidden_error(&mut self, next_y_diff: MatRef<'_>, next_theta: MatRef<'_>, n_samples: usize) {
        gemm_nt(next_y_diff, next_theta.skip_first_row(), self.y_diff.view_mut());

        let y_pred = self.next_x1.view().skip_first_col();
        let mut y_true = self.y_true.view_mut();
        y_true.copy_from(y_pred);
        for i in 0..y_pred.rows() {
            for (t, d) in y_true.row_mut(i).iter_mut().zip(self.y_diff.row(i)) {
                *t -= d;
            }
        }
        self.diagnostic_loss = SquareLoss::value(self.y_true.view(), y_pred, n_samples);

        self.couple_activation_grad();
    }

    fn couple_activation_grad(&mut self) {
        let y_pred = self.next_x1.view().skip_first_col();
        self.activation
            .grad(self.z.view(), y_pred, self.h_grad.view_mut());
        self.y_diff.view_mut().mul_elem(self.h_grad.view());
    }

    /// `Grad = X1ᵀ · y_diff`.
    pub fn weight_gradient(&self, x1: MatRef<'_>, grad: MatMut<'_>) {
        gemm_tn(x1, self.y_diff.view(), grad);
    }

    /// `Theta += optimizer(Grad)`. No-op for layers without an optimizer.
    pub fn apply_update(&mut self, params: LayerParams<'_>) {
        let Some(optimizer) = self.optimizer.as_mut() else {
            return;
        };
        optimizer.update(params.grad, params.update);
        for (t, u) in params.theta.iter_mut().zip(params.update.iter()) {
            *t += u;
        }
    }
}
