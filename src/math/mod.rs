pub mod matrix;

pub use matrix::{MatMut, MatRef, Matrix};
