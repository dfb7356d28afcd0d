use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MlpError, Result};
use crate::optim::{
    adadelta::Adadelta,
    adagrad::Adagrad,
    adam::Adam,
    lbfgs::Lbfgs,
    minimize::{Minimizer, MinimizerFactory},
    momentum::Momentum,
    optimizer::{Optimizer, OptimizerFactory},
    rmsprop::RmsProp,
    sgd::Sgd,
};

/// Selects how weights are updated during a fit.
///
/// Every variant except `Lbfgs` and `CustomMinimizer` yields a per-layer
/// optimizer applied after each minibatch. Those two drive the whole flat
/// parameter vector through a full-batch minimizer instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Solver {
    Sgd {
        step_size: f64,
    },
    Momentum {
        step_size: f64,
        momentum: f64,
        nesterov: bool,
    },
    Adagrad {
        step_size: f64,
        epsilon: f64,
    },
    #[serde(rename = "rmsprop")]
    RmsProp {
        step_size: f64,
        decay: f64,
        epsilon: f64,
    },
    Adadelta {
        rho: f64,
        epsilon: f64,
    },
    Adam {
        step_size: f64,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
    },
    Lbfgs {
        memory: usize,
    },
    #[serde(skip)]
    CustomOptimizer(OptimizerFactory),
    #[serde(skip)]
    CustomMinimizer(MinimizerFactory),
}

impl Solver {
    pub fn adam() -> Self {
        Solver::Adam {
            step_size: 0.01,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }

    /// True for solvers that minimize the full-batch objective externally.
    pub fn is_full_batch(&self) -> bool {
        matches!(self, Solver::Lbfgs { .. } | Solver::CustomMinimizer(_))
    }

    /// Fresh per-layer optimizer, or `None` for full-batch solvers.
    pub fn build_optimizer(&self) -> Option<Box<dyn Optimizer>> {
        let opt: Box<dyn Optimizer> = match *self {
            Solver::Sgd { step_size } => Box::new(Sgd::new(step_size)),
            Solver::Momentum {
                step_size,
                momentum,
                nesterov,
            } => Box::new(Momentum::new(step_size, momentum, nesterov)),
            Solver::Adagrad { step_size, epsilon } => Box::new(Adagrad::new(step_size, epsilon)),
            Solver::RmsProp {
                step_size,
                decay,
                epsilon,
            } => Box::new(RmsProp::new(step_size, decay, epsilon)),
            Solver::Adadelta { rho, epsilon } => Box::new(Adadelta::new(rho, epsilon)),
            Solver::Adam {
                step_size,
                beta1,
                beta2,
                epsilon,
            } => Box::new(Adam::new(step_size, beta1, beta2, epsilon)),
            Solver::CustomOptimizer(ref factory) => factory.build(),
            Solver::Lbfgs { .. } | Solver::CustomMinimizer(_) => return None,
        };
        Some(opt)
    }

    /// The full-batch minimizer, or `None` for per-layer solvers.
    pub fn build_minimizer(&self) -> Option<Box<dyn Minimizer>> {
        match self {
            Solver::Lbfgs { memory } => Some(Box::new(Lbfgs::new(*memory))),
            Solver::CustomMinimizer(factory) => Some(factory.build()),
            _ => None,
        }
    }

    /// Validate hyperparameters.
    pub fn validate(&self) -> Result<()> {
        fn positive(what: &str, v: f64) -> Result<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(MlpError::config(format!("{what} must be finite and > 0, got {v}")))
            }
        }
        fn unit(what: &str, v: f64) -> Result<()> {
            if v.is_finite() && (0.0..1.0).contains(&v) {
                Ok(())
            } else {
                Err(MlpError::config(format!("{what} must be finite and in [0,1), got {v}")))
            }
        }

        match *self {
            Solver::Sgd { step_size } => positive("sgd step_size", step_size),
            Solver::Momentum {
                step_size,
                momentum,
                ..
            } => {
                positive("momentum step_size", step_size)?;
                unit("momentum", momentum)
            }
            Solver::Adagrad { step_size, epsilon } => {
                positive("adagrad step_size", step_size)?;
                positive("adagrad epsilon", epsilon)
            }
            Solver::RmsProp {
                step_size,
                decay,
                epsilon,
            } => {
                positive("rmsprop step_size", step_size)?;
                unit("rmsprop decay", decay)?;
                positive("rmsprop epsilon", epsilon)
            }
            Solver::Adadelta { rho, epsilon } => {
                unit("adadelta rho", rho)?;
                positive("adadelta epsilon", epsilon)
            }
            Solver::Adam {
                step_size,
                beta1,
                beta2,
                epsilon,
            } => {
                positive("adam step_size", step_size)?;
                unit("adam beta1", beta1)?;
                unit("adam beta2", beta2)?;
                positive("adam epsilon", epsilon)
            }
            Solver::Lbfgs { memory } => {
                if memory == 0 {
                    return Err(MlpError::config("lbfgs memory must be at least 1"));
                }
                Ok(())
            }
            Solver::CustomOptimizer(_) | Solver::CustomMinimizer(_) => Ok(()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Solver::Sgd { .. } => "sgd",
            Solver::Momentum { nesterov: true, .. } => "agd",
            Solver::Momentum { .. } => "momentum",
            Solver::Adagrad { .. } => "adagrad",
            Solver::RmsProp { .. } => "rmsprop",
            Solver::Adadelta { .. } => "adadelta",
            Solver::Adam { .. } => "adam",
            Solver::Lbfgs { .. } => "lbfgs",
            Solver::CustomOptimizer(_) => "custom-optimizer",
            Solver::CustomMinimizer(_) => "custom-minimizer",
        }
    }
}

impl Default for Solver {
    fn default() -> Self {
        Solver::adam()
    }
}

impl FromStr for Solver {
    type Err = MlpError;

    /// Built-in solver with its default hyperparameters.
    fn from_str(name: &str) -> Result<Self> {
        match name {
            "sgd" => Ok(Solver::Sgd { step_size: 0.1 }),
            "momentum" | "agd" => Ok(Solver::Momentum {
                step_size: 0.1,
                momentum: 0.9,
                nesterov: name == "agd",
            }),
            "adagrad" => Ok(Solver::Adagrad {
                step_size: 0.1,
                epsilon: 1e-8,
            }),
            "rmsprop" => Ok(Solver::RmsProp {
                step_size: 0.01,
                decay: 0.9,
                epsilon: 1e-8,
            }),
            "adadelta" => Ok(Solver::Adadelta {
                rho: 0.95,
                epsilon: 1e-6,
            }),
            "adam" => Ok(Solver::adam()),
            "lbfgs" => Ok(Solver::Lbfgs { memory: 10 }),
            other => Err(MlpError::config(format!("unknown solver {other:?}"))),
        }
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
