pub mod bce;
pub mod cross_entropy;
pub mod loss_type;
pub mod mse;

pub use bce::LogLoss;
pub use cross_entropy::CrossEntropyLoss;
pub use loss_type::{CustomLoss, Loss, LossFunction};
pub use mse::SquareLoss;
