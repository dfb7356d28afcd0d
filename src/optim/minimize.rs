use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Objective driven by a full-batch minimizer.
///
/// `grad` returns the gradient at the point most recently passed to `func`;
/// a minimizer must evaluate `func(x)` before asking for `grad(x)`.
pub trait Objective {
    fn func(&mut self, x: &[f64]) -> Result<f64>;
    fn grad(&mut self, x: &[f64], grad: &mut [f64]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum MinimizeStatus {
    Converged,
    BudgetExhausted,
    Failed(String),
}

/// What a minimizer hands back: the best point it saw and how it stopped.
#[derive(Debug, Clone)]
pub struct MinimizeOutcome {
    pub x: Vec<f64>,
    pub f: f64,
    pub evaluations: usize,
    pub status: MinimizeStatus,
}

/// Full-batch numerical minimizer.
///
/// Errors returned by the objective are propagated as-is; a minimizer that
/// gives up on its own reports `MinimizeStatus::Failed` together with the
/// best point found so far.
pub trait Minimizer: fmt::Debug + Send {
    fn minimize(
        &mut self,
        objective: &mut dyn Objective,
        x0: &[f64],
        max_evaluations: usize,
    ) -> Result<MinimizeOutcome>;
}

/// Builds the minimizer for one fit.
#[derive(Clone)]
pub struct MinimizerFactory(pub Arc<dyn Fn() -> Box<dyn Minimizer> + Send + Sync>);

impl MinimizerFactory {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn Minimizer> + Send + Sync + 'static,
    {
        MinimizerFactory(Arc::new(factory))
    }

    pub fn build(&self) -> Box<dyn Minimizer> {
        (self.0)()
    }
}

impl fmt::Debug for MinimizerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MinimizerFactory(..)")
    }
}
