use crate::optim::optimizer::{ensure_len, Optimizer};

/// Adadelta: no global step size; the step is the ratio of running RMS of
/// past updates to running RMS of gradients.
#[derive(Debug, Clone)]
pub struct Adadelta {
    pub rho: f64,
    pub epsilon: f64,
    mean_sq_grad: Vec<f64>,
    mean_sq_step: Vec<f64>,
}

impl Adadelta {
    pub fn new(rho: f64, epsilon: f64) -> Self {
        Adadelta {
            rho,
            epsilon,
            mean_sq_grad: Vec::new(),
            mean_sq_step: Vec::new(),
        }
    }
}

impl Optimizer for Adadelta {
    fn update(&mut self, grad: &[f64], update: &mut [f64]) {
        ensure_len(&mut self.mean_sq_grad, grad.len());
        ensure_len(&mut self.mean_sq_step, grad.len());
        let (rho, eps) = (self.rho, self.epsilon);

        for (i, (u, g)) in update.iter_mut().zip(grad).enumerate() {
            let eg = &mut self.mean_sq_grad[i];
            *eg = rho * *eg + (1.0 - rho) * g * g;
            let ex = &mut self.mean_sq_step[i];
            let step = -((*ex + eps).sqrt() / (self.mean_sq_grad[i] + eps).sqrt()) * g;
            *ex = rho * *ex + (1.0 - rho) * step * step;
            *u = step;
        }
    }
}
