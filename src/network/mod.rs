pub mod backprop;
pub mod network;
pub mod params;

pub use backprop::{clip_gradient, regularize, BackpropOptions};
pub use network::Network;
pub use params::{ParamArena, ParamRange};
