use crate::errors::{EgoError, Result};
use crate::types::{AscentResult, ObjFn};
use crate::utils::CancellationToken;
use bayesopt_doe::{DoeError, Domain};
use log::{debug, info};
use ndarray::{concatenate, Array1, Array2, ArrayBase, Axis, Data, Ix2, Zip};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Gradient ascent parameters
///
/// At step `t` (from 0) the step is `alpha_t * grad` with `alpha_t = pre_mult * (t + 1)^(-gamma)`,
/// each component being capped at `max_relative_change * (upper - lower)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientDescentParams {
    /// Maximum number of steps of an ascent
    pub max_num_steps: usize,
    /// Number of ascents restarted from the last iterate when not converged
    pub max_num_restarts: usize,
    /// Number of last iterates averaged as a candidate solution (0 to disable)
    pub num_steps_averaged: usize,
    /// Step size decay exponent
    pub gamma: f64,
    /// Step size scaling
    pub pre_mult: f64,
    /// Maximum step per component relative to the domain width
    pub max_relative_change: f64,
    /// Convergence threshold on step norm and objective change
    pub tolerance: f64,
}

impl Default for GradientDescentParams {
    fn default() -> Self {
        GradientDescentParams {
            max_num_steps: 40,
            max_num_restarts: 1,
            num_steps_averaged: 0,
            gamma: 0.7,
            pre_mult: 1.0,
            max_relative_change: 0.7,
            tolerance: 1e-7,
        }
    }
}

impl GradientDescentParams {
    /// Check parameters consistency
    pub fn check(&self) -> Result<()> {
        if self.max_num_steps == 0 {
            return Err(EgoError::InvalidConfigError(
                "max_num_steps should be greater than 0".to_string(),
            ));
        }
        for (name, value) in [
            ("gamma", self.gamma),
            ("pre_mult", self.pre_mult),
            ("max_relative_change", self.max_relative_change),
        ] {
            if !value.is_finite() || value <= 0. {
                return Err(EgoError::InvalidConfigError(format!(
                    "{name} should be finite and strictly positive, got {value}"
                )));
            }
        }
        if self.max_relative_change > 1. {
            return Err(EgoError::InvalidConfigError(format!(
                "max_relative_change should be in ]0, 1], got {}",
                self.max_relative_change
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0. {
            return Err(EgoError::InvalidConfigError(format!(
                "tolerance should be finite and non negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Step size at step `t`
    pub fn step_size(&self, t: usize) -> f64 {
        self.pre_mult * ((t + 1) as f64).powf(-self.gamma)
    }
}

/// Multistart gradient ascent maximizing an objective function over a box domain
///
/// `num_random_samples` points are drawn uniformly in the domain, the `num_multistarts` best ones
/// (plus optional explicit start points) are used as starting points of independent
/// gradient ascents run in parallel. The best point found is returned.
pub struct GradientDescentOptimizer<'a, U: Clone + Send + Sync, R: Rng + Clone + Sync> {
    domain: Domain<f64>,
    obj: &'a (dyn ObjFn<U> + Sync),
    obj_data: U,
    num_multistarts: usize,
    num_random_samples: usize,
    params: GradientDescentParams,
    start_points: Option<Array2<f64>>,
    cancellation: Option<CancellationToken>,
    rng: R,
}

impl<'a, U: Clone + Send + Sync> GradientDescentOptimizer<'a, U, Xoshiro256Plus> {
    /// Constructor given the domain, the objective and its user data
    pub fn new(
        domain: &Domain<f64>,
        obj: &'a (dyn ObjFn<U> + Sync),
        obj_data: &U,
    ) -> GradientDescentOptimizer<'a, U, Xoshiro256Plus> {
        Self::new_with_rng(domain, obj, obj_data, Xoshiro256Plus::from_entropy())
    }
}

impl<'a, U: Clone + Send + Sync, R: Rng + Clone + Sync> GradientDescentOptimizer<'a, U, R> {
    /// Constructor with a random generator for reproducibility
    pub fn new_with_rng(
        domain: &Domain<f64>,
        obj: &'a (dyn ObjFn<U> + Sync),
        obj_data: &U,
        rng: R,
    ) -> GradientDescentOptimizer<'a, U, R> {
        GradientDescentOptimizer {
            domain: domain.clone(),
            obj,
            obj_data: obj_data.clone(),
            num_multistarts: 5,
            num_random_samples: 300,
            params: GradientDescentParams::default(),
            start_points: None,
            cancellation: None,
            rng,
        }
    }

    /// Sets the random generator
    pub fn with_rng<R2: Rng + Clone + Sync>(self, rng: R2) -> GradientDescentOptimizer<'a, U, R2> {
        GradientDescentOptimizer {
            domain: self.domain,
            obj: self.obj,
            obj_data: self.obj_data,
            num_multistarts: self.num_multistarts,
            num_random_samples: self.num_random_samples,
            params: self.params,
            start_points: self.start_points,
            cancellation: self.cancellation,
            rng,
        }
    }

    /// Sets the number of ascents started from the best random samples
    pub fn num_multistarts(mut self, num_multistarts: usize) -> Self {
        self.num_multistarts = num_multistarts;
        self
    }

    /// Sets the number of random samples used to select starting points
    pub fn num_random_samples(mut self, num_random_samples: usize) -> Self {
        self.num_random_samples = num_random_samples;
        self
    }

    /// Sets gradient ascent parameters
    pub fn params(mut self, params: &GradientDescentParams) -> Self {
        self.params = params.clone();
        self
    }

    /// Sets explicit starting points (n, nx) run in addition to the random ones
    pub fn start_points(mut self, start_points: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Self {
        self.start_points = Some(start_points.to_owned());
        self
    }

    /// Sets a cancellation token checked before each ascent
    pub fn cancellation(mut self, token: &CancellationToken) -> Self {
        self.cancellation = Some(token.clone());
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(|token| token.is_cancelled())
            .unwrap_or(false)
    }

    fn eval(&self, x: &Array1<f64>, grad: Option<&mut Array1<f64>>) -> f64 {
        let mut obj_data = self.obj_data.clone();
        let y = match grad {
            Some(grad) => {
                let mut g = vec![0.; x.len()];
                let y = (self.obj)(&x.to_vec(), Some(g.as_mut_slice()), &mut obj_data);
                grad.assign(&Array1::from_vec(g));
                // fixed components never move
                Zip::from(grad)
                    .and(&self.domain.widths())
                    .for_each(|g, w| {
                        if *w <= 0. || !g.is_finite() {
                            *g = 0.
                        }
                    });
                y
            }
            None => (self.obj)(&x.to_vec(), None, &mut obj_data),
        };
        if y.is_nan() {
            f64::NEG_INFINITY
        } else {
            y
        }
    }

    /// Select starting points: explicit ones (clamped into the domain) followed by
    /// the `num_multistarts` best random samples, ties broken by sampling order.
    fn starting_points(&self) -> Result<Array2<f64>> {
        let dim = self.domain.dim();
        let mut rng = self.rng.clone();
        let samples = self.domain.sample_uniform(self.num_random_samples, &mut rng);
        let mut values = Array1::<f64>::zeros(samples.nrows());
        Zip::from(&mut values)
            .and(samples.rows())
            .par_for_each(|y, x| *y = self.eval(&x.to_owned(), None));

        let mut ranks: Vec<usize> = (0..samples.nrows()).collect();
        // stable sort: equal values keep their sampling order
        ranks.sort_by(|&i, &j| {
            values[j]
                .partial_cmp(&values[i])
                .unwrap_or(Ordering::Equal)
        });
        let n_best = self.num_multistarts.min(samples.nrows());
        let best = samples.select(Axis(0), &ranks[..n_best]);

        let starts = match &self.start_points {
            Some(explicit) => {
                if explicit.ncols() != dim {
                    return Err(DoeError::DimensionMismatch {
                        expected: dim,
                        actual: explicit.ncols(),
                    }
                    .into());
                }
                let mut explicit = explicit.to_owned();
                for mut row in explicit.rows_mut() {
                    self.domain.clamp_inplace(&mut row);
                }
                concatenate![Axis(0), explicit, best]
            }
            None => best,
        };
        if starts.nrows() == 0 {
            return Err(EgoError::InvalidConfigError(format!(
                "no starting point for {dim}-dimensional gradient ascent"
            )));
        }
        Ok(starts)
    }

    /// One gradient ascent (with restarts) from `x0`.
    /// Returns the best iterate, its value and whether the ascent converged.
    fn ascend(&self, x0: Array1<f64>) -> (Array1<f64>, f64, bool) {
        let widths = self.domain.widths();
        let max_steps = widths.mapv(|w| self.params.max_relative_change * w);
        let tol = self.params.tolerance;

        let mut x = x0;
        let mut grad = Array1::zeros(x.len());
        let mut fx = self.eval(&x, Some(&mut grad));
        let mut best = (x.clone(), fx);
        let mut converged = false;

        for restart in 0..=self.params.max_num_restarts {
            let mut history: Vec<Array1<f64>> = Vec::with_capacity(self.params.max_num_steps);
            for t in 0..self.params.max_num_steps {
                let alpha = self.params.step_size(t);
                let mut step = Array1::zeros(x.len());
                Zip::from(&mut step)
                    .and(&grad)
                    .and(&max_steps)
                    .for_each(|s, g, m| *s = (alpha * g).clamp(-m, *m));
                let mut x_new = &x + &step;
                self.domain.clamp_inplace(&mut x_new);

                let step_norm = (&x_new - &x).mapv(|v| v * v).sum().sqrt();
                let mut grad_new = Array1::zeros(x.len());
                let f_new = self.eval(&x_new, Some(&mut grad_new));
                let improvement = (f_new - fx).abs();

                x = x_new;
                fx = f_new;
                grad = grad_new;
                history.push(x.clone());
                if fx > best.1 {
                    best = (x.clone(), fx);
                }
                if step_norm < tol || improvement < tol {
                    debug!("Gradient ascent converged at step {t} (restart {restart})");
                    converged = true;
                    break;
                }
            }

            let n_avg = self.params.num_steps_averaged.min(history.len());
            if n_avg > 0 {
                let last = &history[history.len() - n_avg..];
                let mut x_avg = last
                    .iter()
                    .fold(Array1::zeros(x.len()), |acc, xi| acc + xi)
                    / n_avg as f64;
                self.domain.clamp_inplace(&mut x_avg);
                let f_avg = self.eval(&x_avg, None);
                if f_avg > best.1 {
                    best = (x_avg, f_avg);
                }
            }

            if converged {
                break;
            }
            // restart from the best iterate with a fresh step size schedule
            x = best.0.clone();
            fx = self.eval(&x, Some(&mut grad));
        }
        (best.0, best.1, converged)
    }

    /// Run multistart gradient ascent, returns the best point found.
    ///
    /// Running out of steps is not an error: it is logged and reported
    /// through [`AscentResult::converged`].
    pub fn maximize(&self) -> Result<AscentResult> {
        if self.num_multistarts == 0 && self.start_points.is_none() {
            return Err(EgoError::InvalidConfigError(
                "num_multistarts should be greater than 0".to_string(),
            ));
        }
        self.params.check()?;
        if self.is_cancelled() {
            return Err(EgoError::Cancelled);
        }
        let starts = self.starting_points()?;
        debug!("Gradient ascent from {} starting points", starts.nrows());

        let mut results = (0..starts.nrows())
            .into_par_iter()
            .map(|i| {
                if self.is_cancelled() {
                    return Err(EgoError::Cancelled);
                }
                Ok(self.ascend(starts.row(i).to_owned()))
            })
            .collect::<Result<Vec<_>>>()?;

        // Pick best, ties go to the lowest start index
        let mut best_index = 0;
        for (i, res) in results.iter().enumerate() {
            if res.1 > results[best_index].1 {
                best_index = i;
            }
        }
        let n_converged = results.iter().filter(|res| res.2).count();
        let converged = n_converged == results.len();
        if !converged {
            info!(
                "Gradient ascent step budget exhausted for {}/{} starts",
                results.len() - n_converged,
                results.len()
            );
        }
        let (x_opt, y_opt, _) = results.swap_remove(best_index);
        Ok(AscentResult {
            x_opt,
            y_opt,
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, s};

    fn paraboloid(x: &[f64], grad: Option<&mut [f64]>, _data: &mut ()) -> f64 {
        // max at (0.3, -0.2)
        if let Some(grad) = grad {
            grad[0] = -2. * (x[0] - 0.3);
            grad[1] = -2. * (x[1] + 0.2);
        }
        -(x[0] - 0.3).powi(2) - (x[1] + 0.2).powi(2)
    }

    #[test]
    fn test_maximize_paraboloid() {
        let domain = Domain::new(&array![[-1., 1.], [-1., 1.]]).unwrap();
        let res = GradientDescentOptimizer::new(&domain, &paraboloid, &())
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .num_multistarts(3)
            .num_random_samples(20)
            .params(&GradientDescentParams {
                max_num_steps: 200,
                gamma: 0.2,
                pre_mult: 0.5,
                ..Default::default()
            })
            .maximize()
            .unwrap();
        assert_abs_diff_eq!(res.x_opt, array![0.3, -0.2], epsilon = 1e-3);
        assert_abs_diff_eq!(res.y_opt, 0., epsilon = 1e-6);
        assert!(res.converged);
    }

    #[test]
    fn test_fewer_random_samples_than_multistarts() {
        let domain = Domain::new(&array![[-1., 1.], [-1., 1.]]).unwrap();
        let optimizer = GradientDescentOptimizer::new(&domain, &paraboloid, &())
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .num_multistarts(5)
            .num_random_samples(2);
        let starts = optimizer.starting_points().unwrap();
        assert_eq!(starts.dim(), (2, 2));
        assert!(optimizer.maximize().is_ok());
    }

    #[test]
    fn test_equal_values_keep_sampling_order() {
        let flat = |_x: &[f64], grad: Option<&mut [f64]>, _data: &mut ()| -> f64 {
            if let Some(grad) = grad {
                grad.iter_mut().for_each(|g| *g = 0.);
            }
            1.
        };
        let domain = Domain::new(&array![[0., 1.], [-2., 2.]]).unwrap();
        let rng = Xoshiro256Plus::seed_from_u64(7);
        let samples = domain.sample_uniform(10, &mut rng.clone());
        let starts = GradientDescentOptimizer::new_with_rng(&domain, &flat, &(), rng)
            .num_multistarts(4)
            .num_random_samples(10)
            .starting_points()
            .unwrap();
        assert_eq!(starts, samples.slice(s![..4, ..]));
    }

    #[test]
    fn test_maximize_on_boundary_and_fixed_dimension() {
        // max of x0 + x1 on [0, 1] x {0.5}
        let obj = |x: &[f64], grad: Option<&mut [f64]>, _data: &mut ()| -> f64 {
            if let Some(grad) = grad {
                grad[0] = 1.;
                grad[1] = 1.;
            }
            x[0] + x[1]
        };
        let domain = Domain::new(&array![[0., 1.], [0.5, 0.5]]).unwrap();
        let res = GradientDescentOptimizer::new(&domain, &obj, &())
            .with_rng(Xoshiro256Plus::seed_from_u64(0))
            .maximize()
            .unwrap();
        assert_abs_diff_eq!(res.x_opt, array![1., 0.5]);
        assert!(domain.contains(&res.x_opt));
    }

    #[test]
    fn test_reproducible_with_same_seed() {
        let domain = Domain::new(&array![[-1., 1.], [-1., 1.]]).unwrap();
        let run = || {
            GradientDescentOptimizer::new(&domain, &paraboloid, &())
                .with_rng(Xoshiro256Plus::seed_from_u64(7))
                .params(&GradientDescentParams {
                    max_num_steps: 3,
                    ..Default::default()
                })
                .maximize()
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_budget_exhaustion_is_not_an_error() {
        let domain = Domain::new(&array![[-1., 1.], [-1., 1.]]).unwrap();
        let res = GradientDescentOptimizer::new(&domain, &paraboloid, &())
            .with_rng(Xoshiro256Plus::seed_from_u64(1))
            .num_random_samples(10)
            .params(&GradientDescentParams {
                max_num_steps: 1,
                max_num_restarts: 0,
                pre_mult: 1e-3,
                ..Default::default()
            })
            .maximize()
            .unwrap();
        assert!(!res.converged);
        assert!(domain.contains(&res.x_opt));
    }

    #[test]
    fn test_explicit_start_points_are_clamped() {
        let domain = Domain::new(&array![[-1., 1.], [-1., 1.]]).unwrap();
        let res = GradientDescentOptimizer::new(&domain, &paraboloid, &())
            .with_rng(Xoshiro256Plus::seed_from_u64(1))
            .num_multistarts(0)
            .start_points(&array![[5., 5.]])
            .params(&GradientDescentParams {
                max_num_steps: 1,
                max_num_restarts: 0,
                pre_mult: 1e-6,
                ..Default::default()
            })
            .maximize()
            .unwrap();
        assert!(domain.contains(&res.x_opt));
        assert_abs_diff_eq!(res.x_opt, array![1., 1.], epsilon = 1e-5);

        let res = GradientDescentOptimizer::new(&domain, &paraboloid, &())
            .start_points(&array![[0.5, 0.5, 0.5]])
            .maximize();
        assert!(matches!(res, Err(EgoError::DoeError(_))));
    }

    #[test]
    fn test_cancelled() {
        let domain = Domain::new(&array![[-1., 1.]]).unwrap();
        let obj = |x: &[f64], _grad: Option<&mut [f64]>, _data: &mut ()| -> f64 { x[0] };
        let token = CancellationToken::new();
        token.cancel();
        let res = GradientDescentOptimizer::new(&domain, &obj, &())
            .cancellation(&token)
            .maximize();
        assert!(matches!(res, Err(EgoError::Cancelled)));
    }

    #[test]
    fn test_invalid_params() {
        let params = GradientDescentParams {
            gamma: -1.,
            ..Default::default()
        };
        assert!(params.check().is_err());
        let params = GradientDescentParams {
            max_num_steps: 0,
            ..Default::default()
        };
        assert!(params.check().is_err());
        assert!(GradientDescentParams::default().check().is_ok());
        assert_abs_diff_eq!(GradientDescentParams::default().step_size(0), 1.);
    }
}
