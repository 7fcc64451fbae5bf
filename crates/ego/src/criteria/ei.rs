use crate::criteria::InfillCriterion;
use crate::utils::{norm_cdf, norm_pdf};
use bayesopt_gp::GaussianProcess;
use ndarray::{Array1, ArrayView};

/// Expected improvement `E[max(fmin - Y, 0)]` of a gaussian variable `Y ~ N(mean, var)`.
///
/// When the variance vanishes, the improvement is deterministic: `max(fmin - mean, 0)`.
/// The result is never negative.
pub fn expected_improvement_from_moments(mean: f64, var: f64, fmin: f64) -> f64 {
    let ei = if var < f64::EPSILON {
        fmin - mean
    } else {
        let sigma = var.sqrt();
        let z = (fmin - mean) / sigma;
        sigma * (z * norm_cdf(z) + norm_pdf(z))
    };
    // max also maps NaN to 0
    ei.max(0.)
}

/// A structure for Expected Improvement implementation
#[derive(Clone, Debug)]
pub struct ExpectedImprovement;

impl InfillCriterion for ExpectedImprovement {
    fn name(&self) -> &'static str {
        "EI"
    }

    /// Compute EI infill criterion at given `x` point using the GP `gp`
    /// and the current minimum of the objective function.
    fn value(&self, x: &[f64], gp: &GaussianProcess<f64>, fmin: f64) -> f64 {
        let Ok(pt) = ArrayView::from_shape((1, x.len()), x) else {
            return 0.0;
        };
        match gp.predict_valvar(&pt) {
            Ok((p, s)) => expected_improvement_from_moments(p[0], s[0], fmin),
            _ => 0.0,
        }
    }

    /// Computes derivatives of EI infill criterion wrt to x components at given `x` point
    /// using the GP `gp` and the current minimum of the objective function.
    ///
    /// `dEI = -cdf(z) dmu + pdf(z) dsigma` with `z = (fmin - mu) / sigma`
    fn grad(&self, x: &[f64], gp: &GaussianProcess<f64>, fmin: f64) -> Array1<f64> {
        let Ok(pt) = ArrayView::from_shape((1, x.len()), x) else {
            return Array1::zeros(x.len());
        };
        match (gp.predict_valvar(&pt), gp.predict_valvar_gradients(&pt)) {
            (Ok((p, s)), Ok((y_prime, var_prime))) => {
                let pred = p[0];
                let y_prime = y_prime.row(0);
                if s[0] < f64::EPSILON {
                    if fmin > pred {
                        y_prime.mapv(|v| -v)
                    } else {
                        Array1::zeros(x.len())
                    }
                } else {
                    let sigma = s[0].sqrt();
                    let arg = (fmin - pred) / sigma;
                    let sig_prime = var_prime.row(0).mapv(|v| v / (2. * sigma));
                    y_prime.mapv(|v| -v * norm_cdf(arg)) + sig_prime * norm_pdf(arg)
                }
            }
            _ => Array1::zeros(x.len()),
        }
    }
}

/// Expected Improvement infill criterion
pub const EI: ExpectedImprovement = ExpectedImprovement {};
