//! Available infill criteria used to select next points
mod ei;
mod qei;

pub use ei::{expected_improvement_from_moments, ExpectedImprovement, EI};
pub use qei::MonteCarloEi;

use crate::errors::{EgoError, Result};
use bayesopt_gp::GaussianProcess;
use ndarray::{Array1, ArrayBase, Data, Ix2};

/// A trait for infill criterion which maximum location will
/// determine the next most promising point(s) expected to be the
/// optimum location of the objective function
pub trait InfillCriterion: Clone + Sync {
    /// Name of the infill criterion
    fn name(&self) -> &'static str;

    /// Criterion value at given point(s) `x` (flattened when several points are evaluated at once)
    /// with regards to given GP of the objective function and the current found min.
    fn value(&self, x: &[f64], gp: &GaussianProcess<f64>, fmin: f64) -> f64;

    /// Derivatives wrt x components of the criterion value
    fn grad(&self, x: &[f64], gp: &GaussianProcess<f64>, fmin: f64) -> Array1<f64>;
}

/// Expected improvement of a batch of (q, nx) `points` against the given GP:
/// analytic for a single point, Monte Carlo estimation using `mc_iterations`
/// draws generated from `seed` otherwise.
///
/// The improvement is measured wrt the minimum observed value of the GP,
/// hence the GP is required to hold at least one observation.
pub fn expected_improvement(
    gp: &GaussianProcess<f64>,
    points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    mc_iterations: usize,
    seed: u64,
) -> Result<f64> {
    let fmin = gp.best_value().ok_or_else(|| {
        EgoError::InvalidConfigError(
            "expected improvement requires at least one observation".to_string(),
        )
    })?;
    if points.ncols() != gp.dim() {
        return Err(EgoError::InvalidConfigError(format!(
            "points dimension {} does not match GP dimension {}",
            points.ncols(),
            gp.dim()
        )));
    }
    match points.nrows() {
        0 => Err(EgoError::InvalidConfigError(
            "expected improvement requires at least one point".to_string(),
        )),
        1 => {
            let (mean, var) = gp.predict_valvar(points)?;
            Ok(expected_improvement_from_moments(mean[0], var[0], fmin))
        }
        q => {
            if mc_iterations == 0 {
                return Err(EgoError::InvalidConfigError(
                    "mc_iterations should be greater than 0".to_string(),
                ));
            }
            let qei = MonteCarloEi::new(q, mc_iterations, seed);
            Ok(qei.batch_value(gp, points, fmin)?)
        }
    }
}
