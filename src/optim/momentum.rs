use crate::optim::optimizer::{ensure_len, Optimizer};

/// Heavy-ball momentum, or Nesterov's accelerated gradient when `nesterov`
/// is set.
#[derive(Debug, Clone)]
pub struct Momentum {
    pub step_size: f64,
    pub momentum: f64,
    pub nesterov: bool,
    velocity: Vec<f64>,
}

impl Momentum {
    pub fn new(step_size: f64, momentum: f64, nesterov: bool) -> Self {
        Momentum {
            step_size,
            momentum,
            nesterov,
            velocity: Vec::new(),
        }
    }
}

impl Optimizer for Momentum {
    fn update(&mut self, grad: &[f64], update: &mut [f64]) {
        ensure_len(&mut self.velocity, grad.len());
        let (lr, mu) = (self.step_size, self.momentum);

        for ((u, v), g) in update.iter_mut().zip(self.velocity.iter_mut()).zip(grad) {
            *v = mu * *v - lr * g;
            *u = if self.nesterov { mu * *v - lr * g } else { *v };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_matches_sgd_then_accelerates() {
        let mut opt = Momentum::new(0.1, 0.9, false);
        let mut update = [0.0];
        opt.update(&[1.0], &mut update);
        assert!((update[0] + 0.1).abs() < 1e-12);
        opt.update(&[1.0], &mut update);
        assert!((update[0] + 0.19).abs() < 1e-12);
    }

    #[test]
    fn nesterov_looks_ahead() {
        let mut opt = Momentum::new(0.1, 0.9, true);
        let mut update = [0.0];
        opt.update(&[1.0], &mut update);
        assert!((update[0] + 0.19).abs() < 1e-12);
    }
}
