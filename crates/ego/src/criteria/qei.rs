use crate::criteria::InfillCriterion;
use bayesopt_gp::{GaussianProcess, GpError};
use finitediff::vec;
use ndarray::{concatenate, Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Ix2, Zip};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

/// Monte Carlo estimation of the multi-points expected improvement (q-EI)
///
/// `q-EI(x_1, ..., x_q) = E[max(fmin - min_i Y(x_i), 0)]` where `Y` follows the GP posterior.
/// Standard normal draws are generated once from the seed, every evaluation reuses them
/// (common random numbers) so the estimate is a deterministic smooth function of the points.
///
/// The criterion `value` and `grad` take the q points flattened row-wise in a `q * nx` slice.
/// Optional fixed points (e.g. points pending evaluation) are appended to every batch.
#[derive(Clone, Debug)]
pub struct MonteCarloEi {
    /// Number of points optimized jointly
    q: usize,
    /// Points appended to each evaluated batch (p, nx)
    fixed_points: Option<Array2<f64>>,
    mc_iterations: usize,
    seed: u64,
    /// Standard normal draws (mc_iterations, q + p)
    normals: Array2<f64>,
}

impl MonteCarloEi {
    /// Constructor for batches of `q` points using `mc_iterations` draws generated from `seed`
    pub fn new(q: usize, mc_iterations: usize, seed: u64) -> Self {
        MonteCarloEi {
            q,
            fixed_points: None,
            mc_iterations,
            seed,
            normals: draw_normals(mc_iterations, q, seed),
        }
    }

    /// Sets points included in every batch, their improvement is accounted but they are not optimized
    pub fn with_fixed_points(self, fixed_points: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Self {
        if fixed_points.nrows() == 0 {
            return self;
        }
        let k = self.q + fixed_points.nrows();
        MonteCarloEi {
            fixed_points: Some(fixed_points.to_owned()),
            normals: draw_normals(self.mc_iterations, k, self.seed),
            ..self
        }
    }

    /// Number of points optimized jointly
    pub fn q(&self) -> usize {
        self.q
    }

    /// Number of Monte Carlo draws
    pub fn mc_iterations(&self) -> usize {
        self.mc_iterations
    }

    /// q-EI estimation of the given (q, nx) `points` (plus fixed points if any)
    pub fn batch_value(
        &self,
        gp: &GaussianProcess<f64>,
        points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        fmin: f64,
    ) -> Result<f64, GpError> {
        if self.mc_iterations == 0 {
            return Ok(0.);
        }
        let all = match &self.fixed_points {
            Some(fixed) => concatenate![Axis(0), points.view(), fixed.view()],
            None => points.to_owned(),
        };
        if all.nrows() != self.normals.ncols() {
            return Err(GpError::ConfigurationError(format!(
                "q-EI set up for batches of {} points, got {}",
                self.normals.ncols(),
                all.nrows()
            )));
        }
        let (mean, factor) = gp.posterior_mean_factor(&all)?;
        let draws = self.normals.dot(&factor.t()) + &mean;

        let mut improvements = Array1::<f64>::zeros(self.mc_iterations);
        Zip::from(&mut improvements)
            .and(draws.rows())
            .par_for_each(|imp, y| {
                let ymin = y.fold(f64::INFINITY, |acc, &v| acc.min(v));
                *imp = (fmin - ymin).max(0.);
            });
        Ok(improvements.sum() / self.mc_iterations as f64)
    }

    fn as_points<'a>(&self, x: &'a [f64], nx: usize) -> Option<ArrayView2<'a, f64>> {
        if nx == 0 || x.len() != self.q * nx {
            return None;
        }
        ArrayView2::from_shape((self.q, nx), x).ok()
    }
}

impl InfillCriterion for MonteCarloEi {
    fn name(&self) -> &'static str {
        "qEI"
    }

    fn value(&self, x: &[f64], gp: &GaussianProcess<f64>, fmin: f64) -> f64 {
        match self.as_points(x, gp.dim()) {
            Some(points) => self.batch_value(gp, &points, fmin).unwrap_or(0.),
            None => 0.,
        }
    }

    /// Central finite differences of the q-EI estimation,
    /// smooth as the same draws are used for every evaluation
    fn grad(&self, x: &[f64], gp: &GaussianProcess<f64>, fmin: f64) -> Array1<f64> {
        let f = |x: &Vec<f64>| -> std::result::Result<f64, anyhow::Error> {
            Ok(self.value(x, gp, fmin))
        };
        let grad = match vec::central_diff(&f)(&x.to_vec()) {
            Ok(grad) => Array1::from_vec(grad),
            Err(_) => Array1::zeros(x.len()),
        };
        grad
    }
}

fn draw_normals(mc_iterations: usize, k: usize, seed: u64) -> Array2<f64> {
    let mut rng = Xoshiro256Plus::seed_from_u64(seed);
    Array2::random_using((mc_iterations, k), StandardNormal, &mut rng)
}
