use crate::optim::optimizer::{ensure_len, Optimizer};

/// Adam with bias correction folded into the step size.
#[derive(Debug, Clone)]
pub struct Adam {
    pub step_size: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    beta1_t: f64,
    beta2_t: f64,
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Adam {
    pub fn new(step_size: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Adam {
            step_size,
            beta1,
            beta2,
            epsilon,
            beta1_t: 1.0,
            beta2_t: 1.0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }
}

impl Optimizer for Adam {
    fn update(&mut self, grad: &[f64], update: &mut [f64]) {
        ensure_len(&mut self.m, grad.len());
        ensure_len(&mut self.v, grad.len());

        let Self {
            step_size: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1.0 - self.beta1_t;
        let bc2 = 1.0 - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        update
            .iter_mut()
            .zip(grad)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
            .for_each(|(((u, g), m), v)| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                *u = -step_size * *m / (v.sqrt() + eps);
            });
    }
}
