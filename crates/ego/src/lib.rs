//! This library implements the selection of the next points to evaluate
//! in a Bayesian global optimization loop.
//!
//! Given a [Gaussian process](bayesopt_gp::GaussianProcess) built from the observations
//! of an expensive objective function, the next point(s) are chosen within a box
//! [domain](bayesopt_doe::Domain) by maximizing the expected improvement (EI)
//! over the best observed value:
//!
//! * a single point maximizes the analytic EI,
//! * several points are either selected one after the other using the constant liar
//!   heuristic ([`QEiStrategy::ConstantLiar`]) or jointly by maximizing a Monte Carlo
//!   estimation of the multi-points EI ([`QEiStrategy::Epi`]).
//!
//! Criteria are maximized with a multistart projected gradient ascent
//! ([`GradientDescentOptimizer`]).
//!
//! # Example
//!
//! ```
//! use bayesopt_doe::Domain;
//! use bayesopt_ego::{LieStrategy, NextPointsConfig, NextPointsSelector};
//! use bayesopt_gp::{GaussianProcess, Kernel, KernelKind, Observation};
//! use linfa::ParamGuard;
//! use ndarray::array;
//!
//! let kernel = Kernel::new(KernelKind::SquaredExponential, 1, &[1., 0.2]).expect("valid kernel");
//! let observations = vec![
//!     Observation::new(vec![0.1], 0.5),
//!     Observation::new(vec![0.5], -0.3),
//!     Observation::new(vec![0.9], 0.2),
//! ];
//! let gp = GaussianProcess::construct(kernel, 1, &observations).expect("GP built");
//! let domain = Domain::new(&array![[0., 1.]]).expect("valid domain");
//!
//! let config = NextPointsConfig::default()
//!     .num_to_sample(2)
//!     .lie_strategy(LieStrategy::Min)
//!     .seed(42)
//!     .check()
//!     .expect("valid configuration");
//! let res = NextPointsSelector::new(config)
//!     .select_batch(&gp, &domain)
//!     .expect("points selected");
//! println!("Next points {} (EI = {})", res.points, res.expected_improvement);
//! ```
//!
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod criteria;
pub mod optimizers;

mod errors;
mod solver;
mod types;

pub use crate::criteria::expected_improvement;
pub use crate::errors::*;
pub use crate::optimizers::{GradientDescentOptimizer, GradientDescentParams};
pub use crate::solver::*;
pub use crate::types::*;
pub use crate::utils::{CancellationToken, BAYESOPT_LOG};

mod utils;
