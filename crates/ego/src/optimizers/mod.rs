//! Optimizers used internally to optimize infill criteria

mod gradient_descent;

pub use gradient_descent::*;
