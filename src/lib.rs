//! `bayesopt` selects the next points to evaluate when minimizing an expensive
//! function with Bayesian global optimization.
//!
//! Requests carry the evaluations known so far, the GP covariance and the box domain.
//! They are answered by the routes:
//!
//! * [`next_points`] with [`NextPointsRoute::Epi`], [`NextPointsRoute::ConstantLiar`]
//!   or [`NextPointsRoute::Kriging`] selection of a batch of points,
//! * [`gp_mean_var`] GP posterior mean and covariance at given points,
//! * [`gp_ei`] expected improvement of given points.
//!
//! The underlying building blocks live in the workspace crates:
//!
//! * [`bayesopt_doe`]: box domain and sampling,
//! * [`bayesopt_gp`]: covariance kernels and Gaussian process,
//! * [`bayesopt_ego`]: expected improvement criteria, gradient ascent and batch selection.
//!
//! # Example
//!
//! ```
//! use bayesopt::{next_points, NextPointsRequest, NextPointsRoute};
//!
//! let request: NextPointsRequest = serde_json::from_str(r#"{
//!     "num_to_sample": 2,
//!     "lie_value": 0.0,
//!     "gp_historical_info": {"points_sampled": [{"point": [0.5], "value": 1.0, "value_var": 0.0}]},
//!     "covariance_info": {"covariance_type": "squared_exponential", "hyperparameters": [1.0, 0.2]},
//!     "domain_info": {"dim": 1, "domain_bounds": [{"min": 0.0, "max": 1.0}]},
//!     "seed": 42
//! }"#).expect("valid request");
//! let response = next_points(NextPointsRoute::ConstantLiar, &request, None).expect("next points");
//! assert_eq!(response.points_to_sample.len(), 2);
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

mod errors;
mod routes;
mod types;

pub use errors::*;
pub use routes::*;
pub use types::*;

pub use bayesopt_doe;
pub use bayesopt_ego;
pub use bayesopt_gp;
