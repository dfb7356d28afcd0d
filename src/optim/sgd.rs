use crate::optim::optimizer::Optimizer;

/// Plain gradient step: `update = -step_size * grad`.
#[derive(Debug, Clone)]
pub struct Sgd {
    pub step_size: f64,
}

impl Sgd {
    pub fn new(step_size: f64) -> Sgd {
        Sgd { step_size }
    }
}

impl Optimizer for Sgd {
    fn update(&mut self, grad: &[f64], update: &mut [f64]) {
        for (u, g) in update.iter_mut().zip(grad) {
            *u = -self.step_size * g;
        }
    }
}
