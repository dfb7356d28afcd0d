use std::ops::Range;

use crate::math::matrix::{MatMut, MatRef};

/// Where one layer's `(inputs, outputs)` weight matrix lives in the arena.
///
/// `inputs` counts the bias row, so it is one more than the width of the
/// layer feeding in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRange {
    pub offset: usize,
    pub inputs: usize,
    pub outputs: usize,
}

impl ParamRange {
    pub fn len(&self) -> usize {
        self.inputs * self.outputs
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len()
    }
}

/// Lays out the weight matrices of `n_features -> hidden... -> n_outputs`
/// back to back.
pub fn plan(n_features: usize, hidden: &[usize], n_outputs: usize) -> Vec<ParamRange> {
    let mut ranges = Vec::with_capacity(hidden.len() + 1);
    let mut offset = 0;
    let mut prev = n_features;
    for &outputs in hidden.iter().chain(std::iter::once(&n_outputs)) {
        let r = ParamRange {
            offset,
            inputs: prev + 1,
            outputs,
        };
        offset += r.len();
        prev = outputs;
        ranges.push(r);
    }
    ranges
}

/// One layer's slices of the three arena buffers.
pub struct LayerParams<'a> {
    pub theta: &'a mut [f64],
    pub grad: &'a mut [f64],
    pub update: &'a mut [f64],
}

/// The three flat buffers every layer's `Theta`, `Grad` and `Update` are
/// carved from. Writing the flat `theta` buffer is the same as writing the
/// layers' weight matrices.
#[derive(Debug, Clone, Default)]
pub struct ParamArena {
    theta: Vec<f64>,
    grad: Vec<f64>,
    update: Vec<f64>,
}

impl ParamArena {
    pub fn with_len(len: usize) -> ParamArena {
        ParamArena {
            theta: vec![0.0; len],
            grad: vec![0.0; len],
            update: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.theta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.theta.is_empty()
    }

    pub fn flat_theta(&self) -> &[f64] {
        &self.theta
    }

    pub fn flat_theta_mut(&mut self) -> &mut [f64] {
        &mut self.theta
    }

    pub fn flat_grad(&self) -> &[f64] {
        &self.grad
    }

    pub fn theta(&self, r: &ParamRange) -> MatRef<'_> {
        MatRef::new(r.inputs, r.outputs, r.outputs, &self.theta[r.range()])
    }

    pub fn theta_mut(&mut self, r: &ParamRange) -> MatMut<'_> {
        MatMut::new(r.inputs, r.outputs, r.outputs, &mut self.theta[r.range()])
    }

    pub fn grad(&self, r: &ParamRange) -> MatRef<'_> {
        MatRef::new(r.inputs, r.outputs, r.outputs, &self.grad[r.range()])
    }

    /// Weights for reading alongside a writable gradient buffer.
    pub fn theta_and_grad_mut(&mut self) -> (&[f64], &mut [f64]) {
        (&self.theta, &mut self.grad)
    }

    pub fn layer_mut(&mut self, r: &ParamRange) -> LayerParams<'_> {
        LayerParams {
            theta: &mut self.theta[r.range()],
            grad: &mut self.grad[r.range()],
            update: &mut self.update[r.range()],
        }
    }
}
