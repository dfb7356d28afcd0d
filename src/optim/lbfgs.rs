use std::collections::VecDeque;

use log::debug;

use crate::error::Result;
use crate::optim::minimize::{MinimizeOutcome, MinimizeStatus, Minimizer, Objective};

/// Limited-memory BFGS with a backtracking Armijo line search.
#[derive(Debug, Clone)]
pub struct Lbfgs {
    /// Number of correction pairs kept.
    pub memory: usize,
    /// Stop once the largest gradient component falls below this.
    pub grad_tolerance: f64,
    /// Stop once an accepted step improves the objective by less than this,
    /// relative to its magnitude.
    pub func_tolerance: f64,
}

impl Default for Lbfgs {
    fn default() -> Self {
        Lbfgs {
            memory: 10,
            grad_tolerance: 1e-10,
            func_tolerance: 1e-14,
        }
    }
}

impl Lbfgs {
    pub fn new(memory: usize) -> Self {
        Lbfgs {
            memory: memory.max(1),
            ..Lbfgs::default()
        }
    }
}

const ARMIJO_C1: f64 = 1e-4;
const MIN_STEP: f64 = 1e-20;

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

struct Correction {
    s: Vec<f64>,
    y: Vec<f64>,
    rho: f64,
}

/// Two-loop recursion: returns `-H g` for the implicit inverse Hessian `H`.
fn search_direction(history: &VecDeque<Correction>, g: &[f64]) -> Vec<f64> {
    let mut q = g.to_vec();
    let mut alphas = Vec::with_capacity(history.len());

    for c in history.iter().rev() {
        let a = c.rho * dot(&c.s, &q);
        q.iter_mut().zip(&c.y).for_each(|(qi, yi)| *qi -= a * yi);
        alphas.push(a);
    }

    let gamma = match history.back() {
        Some(c) => dot(&c.s, &c.y) / dot(&c.y, &c.y),
        None => 1.0 / dot(g, g).sqrt().max(1.0),
    };
    q.iter_mut().for_each(|qi| *qi *= gamma);

    for (c, a) in history.iter().zip(alphas.iter().rev()) {
        let b = c.rho * dot(&c.y, &q);
        q.iter_mut().zip(&c.s).for_each(|(qi, si)| *qi += (a - b) * si);
    }

    q.iter_mut().for_each(|qi| *qi = -*qi);
    q
}

impl Minimizer for Lbfgs {
    fn minimize(
        &mut self,
        objective: &mut dyn Objective,
        x0: &[f64],
        max_evaluations: usize,
    ) -> Result<MinimizeOutcome> {
        let n = x0.len();
        let mut x = x0.to_vec();
        let mut g = vec![0.0; n];
        let mut evaluations = 1;
        let mut f = objective.func(&x)?;
        objective.grad(&x, &mut g)?;

        let mut history: VecDeque<Correction> = VecDeque::with_capacity(self.memory);
        let mut x_new = vec![0.0; n];
        let mut g_new = vec![0.0; n];

        let outcome = |x: Vec<f64>, f: f64, evaluations: usize, status: MinimizeStatus| {
            Ok(MinimizeOutcome {
                x,
                f,
                evaluations,
                status,
            })
        };

        loop {
            if g.iter().all(|gi| gi.abs() <= self.grad_tolerance) {
                return outcome(x, f, evaluations, MinimizeStatus::Converged);
            }
            if evaluations >= max_evaluations {
                return outcome(x, f, evaluations, MinimizeStatus::BudgetExhausted);
            }

            let mut d = search_direction(&history, &g);
            let mut slope = dot(&d, &g);
            if !(slope < 0.0) {
                // Curvature information went stale; restart from steepest descent.
                history.clear();
                d = g.iter().map(|gi| -gi).collect();
                slope = -dot(&g, &g);
            }

            let mut step = 1.0;
            let f_new = loop {
                x_new
                    .iter_mut()
                    .zip(&x)
                    .zip(&d)
                    .for_each(|((xn, xi), di)| *xn = xi + step * di);
                let f_trial = objective.func(&x_new)?;
                evaluations += 1;

                if f_trial.is_finite() && f_trial <= f + ARMIJO_C1 * step * slope {
                    break f_trial;
                }
                if evaluations >= max_evaluations {
                    return outcome(x, f, evaluations, MinimizeStatus::BudgetExhausted);
                }
                step *= 0.5;
                if step < MIN_STEP {
                    debug!("lbfgs: line search stalled at f={f}");
                    return outcome(x, f, evaluations, MinimizeStatus::Converged);
                }
            };
            objective.grad(&x_new, &mut g_new)?;

            let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
            let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
            let sy = dot(&s, &y);
            if sy > 1e-12 * dot(&y, &y).max(f64::MIN_POSITIVE) {
                if history.len() == self.memory {
                    history.pop_front();
                }
                history.push_back(Correction { s, y, rho: 1.0 / sy });
            }

            let improvement = f - f_new;
            std::mem::swap(&mut x, &mut x_new);
            std::mem::swap(&mut g, &mut g_new);
            f = f_new;

            if improvement <= self.func_tolerance * f.abs().max(1.0) {
                return outcome(x, f, evaluations, MinimizeStatus::Converged);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rosenbrock in two dimensions, with a call-order check.
    struct Rosenbrock {
        last: Option<Vec<f64>>,
    }

    impl Objective for Rosenbrock {
        fn func(&mut self, x: &[f64]) -> Result<f64> {
            self.last = Some(x.to_vec());
            Ok((1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2))
        }

        fn grad(&mut self, x: &[f64], grad: &mut [f64]) -> Result<()> {
            assert_eq!(self.last.as_deref(), Some(x), "grad before func");
            grad[0] = -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0] * x[0]);
            grad[1] = 200.0 * (x[1] - x[0] * x[0]);
            Ok(())
        }
    }

    #[test]
    fn finds_the_rosenbrock_minimum() {
        let mut objective = Rosenbrock { last: None };
        let out = Lbfgs::default()
            .minimize(&mut objective, &[-1.2, 1.0], 2000)
            .unwrap();
        assert_eq!(out.status, MinimizeStatus::Converged);
        assert!((out.x[0] - 1.0).abs() < 1e-4, "{:?}", out.x);
        assert!((out.x[1] - 1.0).abs() < 1e-4, "{:?}", out.x);
    }

    #[test]
    fn respects_the_evaluation_budget() {
        let mut objective = Rosenbrock { last: None };
        let out = Lbfgs::default()
            .minimize(&mut objective, &[-1.2, 1.0], 5)
            .unwrap();
        assert_eq!(out.status, MinimizeStatus::BudgetExhausted);
        assert!(out.evaluations <= 5);
        assert!(out.f < 24.2);
    }
}
