pub mod adadelta;
pub mod adagrad;
pub mod adam;
pub mod lbfgs;
pub mod minimize;
pub mod momentum;
pub mod optimizer;
pub mod rmsprop;
pub mod sgd;
pub mod solver;

pub use lbfgs::Lbfgs;
pub use minimize::{MinimizeOutcome, MinimizeStatus, Minimizer, MinimizerFactory, Objective};
pub use optimizer::{Optimizer, OptimizerFactory};
pub use solver::Solver;
