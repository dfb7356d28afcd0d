use crate::optim::optimizer::{ensure_len, Optimizer};

#[derive(Debug, Clone)]
pub struct RmsProp {
    pub step_size: f64,
    pub decay: f64,
    pub epsilon: f64,
    mean_sq: Vec<f64>,
}

impl RmsProp {
    pub fn new(step_size: f64, decay: f64, epsilon: f64) -> Self {
        RmsProp {
            step_size,
            decay,
            epsilon,
            mean_sq: Vec::new(),
        }
    }
}

impl Optimizer for RmsProp {
    fn update(&mut self, grad: &[f64], update: &mut [f64]) {
        ensure_len(&mut self.mean_sq, grad.len());
        let rho = self.decay;

        for ((u, m), g) in update.iter_mut().zip(self.mean_sq.iter_mut()).zip(grad) {
            *m = rho * *m + (1.0 - rho) * g * g;
            *u = -self.step_size * g / (m.sqrt() + self.epsilon);
        }
    }
}
