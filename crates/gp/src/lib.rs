//! This library implements [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process) regression
//! with zero prior mean and fixed stationary covariance kernels, as used by Bayesian optimization
//! to model an expensive objective from noisy observations.
//!
//! A [GaussianProcess] is conditioned once on observations (factorizing the covariance matrix of
//! the observed points) then queried for its posterior mean and covariance at arbitrary points.
//! It is immutable: a "what-if" GP conditioned on an extra hypothetical observation is obtained
//! with [GaussianProcess::with_hypothetical_observation] without altering the original one.
//!
//! Available kernels are [SquaredExponential](kernels::SquaredExponential),
//! [Matern32](kernels::Matern32) and [Matern52](kernels::Matern52), or the enum [Kernel]
//! selecting one of them at runtime from a [KernelKind].
//!
//! Kernel hyperparameters are not fitted here, they are given by the caller.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
mod errors;
pub mod kernels;
mod parameters;
mod utils;

pub use algorithm::*;
pub use errors::*;
pub use kernels::{CovarianceKernel, Kernel, KernelKind};
pub use parameters::*;
pub use utils::covariance_factor;
