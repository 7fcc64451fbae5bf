use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Result of a next points selection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimResult {
    /// Points to sample as a (num_to_sample, nx) matrix
    pub points: Array2<f64>,
    /// Joint expected improvement of `points` against the GP of the actual observations
    pub expected_improvement: f64,
    /// Whether every internal optimization converged before exhausting its step budget
    pub optimizer_success: bool,
}

/// Outcome of a multistart gradient ascent
#[derive(Clone, Debug, PartialEq)]
pub struct AscentResult {
    /// Best location found
    pub x_opt: Array1<f64>,
    /// Objective value at `x_opt`
    pub y_opt: f64,
    /// Whether every ascent converged before exhausting its step budget
    pub converged: bool,
}

/// Strategy to choose several points at once
/// to benefit from parallel evaluation of the objective function
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QEiStrategy {
    /// Maximize the Monte Carlo multi-points expected improvement (q-EI)
    /// jointly over the num_to_sample points
    Epi,
    /// Select points one at a time, lying about the outcome of selected ones
    /// (see [`LieStrategy`])
    #[default]
    ConstantLiar,
}

/// Value assumed for a selected but not yet evaluated point
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LieStrategy {
    /// A given constant value
    Constant(f64),
    /// The minimum of actually observed values
    #[default]
    Min,
    /// The maximum of actually observed values
    Max,
    /// The mean of actually observed values
    Mean,
    /// The GP posterior mean at the point shifted by `std_deviation_coef` posterior standard deviations
    KrigingBeliever {
        /// Number of standard deviations added to the posterior mean
        std_deviation_coef: f64,
    },
}

/// A trait for functions used by internal optimizers
/// Functions are expected to be defined as `g(x, g, u)` where
/// * `x` is the input information,
/// * `g` an optional gradient information to be updated if present
/// * `u` information provided by the user
pub trait ObjFn<U>: Fn(&[f64], Option<&mut [f64]>, &mut U) -> f64 {}
impl<T, U> ObjFn<U> for T where T: Fn(&[f64], Option<&mut [f64]>, &mut U) -> f64 {}

/// Data used by internal infill criteria optimization
#[derive(Clone, Debug)]
pub struct InfillObjData<F> {
    /// Best value observed so far
    pub fmin: F,
}
