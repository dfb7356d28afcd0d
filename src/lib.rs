pub mod activation;
pub mod error;
pub mod layers;
pub mod loss;
pub mod math;
pub mod metrics;
pub mod network;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use activation::activation::{Activation, ActivationFunction};
pub use error::{MlpError, Result};
pub use layers::dense::Layer;
pub use loss::loss_type::{Loss, LossFunction};
pub use math::matrix::{MatMut, MatRef, Matrix};
pub use network::network::Network;
pub use optim::{Minimizer, Objective, Optimizer, Solver};
pub use train::{EpochStats, FitReport, MlpClassifier, MlpRegressor, TrainConfig};
