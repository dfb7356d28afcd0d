use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::MlpError;
use crate::math::matrix::{MatMut, MatRef};

/// Matrix-level activation contract.
///
/// `func` maps the pre-activation `z` into `y`. `grad` writes the elementwise
/// derivative `dy/dz` into `h`; an implementation may read whichever of `z`
/// or `y` is cheaper for it.
pub trait Activation: fmt::Debug + Send + Sync {
    fn func(&self, z: MatRef<'_>, y: MatMut<'_>);
    fn grad(&self, z: MatRef<'_>, y: MatRef<'_>, h: MatMut<'_>);
    fn name(&self) -> &str;
}

/// A user-supplied activation plugged into the built-in selection.
#[derive(Debug, Clone)]
pub struct CustomActivation(pub Arc<dyn Activation>);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    Identity,
    Logistic,
    Tanh,
    #[serde(rename = "relu")]
    ReLU,
    #[serde(rename = "paramrelu")]
    ParamReLU { slope: f64 },
    Elu { alpha: f64 },
    #[serde(skip)]
    Custom(CustomActivation),
}

impl ActivationFunction {
    pub const DEFAULT_PARAM_RELU_SLOPE: f64 = 0.01;
    pub const DEFAULT_ELU_ALPHA: f64 = 1.0;

    pub fn custom(activation: impl Activation + 'static) -> Self {
        ActivationFunction::Custom(CustomActivation(Arc::new(activation)))
    }

    /// Element-wise activation.
    ///
    /// `Custom` activations only exist at matrix level and return `NaN`
    /// here; go through `Activation::func` for them.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Identity => x,
            ActivationFunction::Logistic => 1.0 / (1.0 + (-x).exp()),
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::ParamReLU { slope } => if x > 0.0 { x } else { slope * x },
            ActivationFunction::Elu { alpha } => {
                if x > 0.0 { x } else { alpha * (x.exp() - 1.0) }
            }
            ActivationFunction::Custom(_) => f64::NAN,
        }
    }

    /// Element-wise derivative given both the input `z` and the output `y`.
    /// `NaN` for `Custom`, whose derivative lives in `Activation::grad`.
    pub fn derivative(&self, z: f64, y: f64) -> f64 {
        match self {
            ActivationFunction::Identity => 1.0,
            ActivationFunction::Logistic => y * (1.0 - y),
            ActivationFunction::Tanh => 1.0 - y * y,
            ActivationFunction::ReLU => if z > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::ParamReLU { slope } => if z > 0.0 { 1.0 } else { *slope },
            // y = alpha*(e^z - 1) on the negative side, so y' = y + alpha.
            ActivationFunction::Elu { alpha } => if z > 0.0 { 1.0 } else { y + alpha },
            ActivationFunction::Custom(_) => f64::NAN,
        }
    }
}

impl Activation for ActivationFunction {
    fn func(&self, z: MatRef<'_>, mut y: MatMut<'_>) {
        match self {
            ActivationFunction::Custom(CustomActivation(inner)) => inner.func(z, y),
            _ => y.apply_from(z, |x| self.function(x)),
        }
    }

    fn grad(&self, z: MatRef<'_>, y: MatRef<'_>, mut h: MatMut<'_>) {
        if let ActivationFunction::Custom(CustomActivation(inner)) = self {
            return inner.grad(z, y, h);
        }
        for i in 0..h.rows() {
            let (z_row, y_row) = (z.row(i), y.row(i));
            for (j, hij) in h.row_mut(i).iter_mut().enumerate() {
                *hij = self.derivative(z_row[j], y_row[j]);
            }
        }
    }

    fn name(&self) -> &str {
        match self {
            ActivationFunction::Identity => "identity",
            ActivationFunction::Logistic => "logistic",
            ActivationFunction::Tanh => "tanh",
            ActivationFunction::ReLU => "relu",
            ActivationFunction::ParamReLU { .. } => "paramrelu",
            ActivationFunction::Elu { .. } => "elu",
            ActivationFunction::Custom(CustomActivation(inner)) => inner.name(),
        }
    }
}

impl Default for ActivationFunction {
    fn default() -> Self {
        ActivationFunction::ReLU
    }
}

impl FromStr for ActivationFunction {
    type Err = MlpError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "identity" => Ok(ActivationFunction::Identity),
            "logistic" | "sigmoid" => Ok(ActivationFunction::Logistic),
            "tanh" => Ok(ActivationFunction::Tanh),
            "relu" => Ok(ActivationFunction::ReLU),
            "paramrelu" => Ok(ActivationFunction::ParamReLU {
                slope: Self::DEFAULT_PARAM_RELU_SLOPE,
            }),
            "elu" => Ok(ActivationFunction::Elu {
                alpha: Self::DEFAULT_ELU_ALPHA,
            }),
            other => Err(MlpError::config(format!("unknown activation {other:?}"))),
        }
    }
}

impl fmt::Display for ActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
