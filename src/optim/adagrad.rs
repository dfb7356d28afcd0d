use crate::optim::optimizer::{ensure_len, Optimizer};

#[derive(Debug, Clone)]
pub struct Adagrad {
    pub step_size: f64,
    pub epsilon: f64,
    sum_sq: Vec<f64>,
}

impl Adagrad {
    pub fn new(step_size: f64, epsilon: f64) -> Self {
        Adagrad {
            step_size,
            epsilon,
            sum_sq: Vec::new(),
        }
    }
}

impl Optimizer for Adagrad {
    fn update(&mut self, grad: &[f64], update: &mut [f64]) {
        ensure_len(&mut self.sum_sq, grad.len());

        for ((u, s), g) in update.iter_mut().zip(self.sum_sq.iter_mut()).zip(grad) {
            *s += g * g;
            *u = -self.step_size * g / (s.sqrt() + self.epsilon);
        }
    }
}
