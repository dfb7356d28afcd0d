use std::fmt;
use std::sync::Arc;

/// Per-layer update rule.
///
/// `update` writes the step for `grad` into `update`; the caller then adds
/// it to the weights, so a descent rule writes a negative multiple of the
/// gradient. Accumulators live in the implementor and persist across
/// minibatches for the lifetime of one fit.
pub trait Optimizer: fmt::Debug + Send {
    fn update(&mut self, grad: &[f64], update: &mut [f64]);
}

/// Builds one fresh optimizer per layer.
#[derive(Clone)]
pub struct OptimizerFactory(pub Arc<dyn Fn() -> Box<dyn Optimizer> + Send + Sync>);

impl OptimizerFactory {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn Optimizer> + Send + Sync + 'static,
    {
        OptimizerFactory(Arc::new(factory))
    }

    pub fn build(&self) -> Box<dyn Optimizer> {
        (self.0)()
    }
}

impl fmt::Debug for OptimizerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OptimizerFactory(..)")
    }
}

/// Grows `state` to `len` zeros the first time it is used.
#[inline]
pub(crate) fn ensure_len(state: &mut Vec<f64>, len: usize) {
    if state.len() != len {
        state.clear();
        state.resize(len, 0.0);
    }
}
