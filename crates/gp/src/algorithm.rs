use crate::errors::{GpError, Result};
use crate::kernels::{gram_matrix, CovarianceKernel, Kernel};
use crate::parameters::{GpParams, GpValidParams};
use crate::utils::{covariance_factor, regularized_cholesky};

use linfa::{Float, ParamGuard};
use linfa_linalg::triangular::*;

use ndarray::{concatenate, s, Array, Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2, Zip};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;

use log::debug;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A noisy observation `y(x) + eps` with `eps ~ N(0, noise_variance)`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct Observation<F: Float> {
    /// Location of the observation
    pub point: Vec<F>,
    /// Observed value
    pub value: F,
    /// Variance of the observation noise
    #[cfg_attr(feature = "serializable", serde(default = "F::zero"))]
    pub noise_variance: F,
}

impl<F: Float> Observation<F> {
    /// Constructor of a noiseless observation
    pub fn new(point: Vec<F>, value: F) -> Self {
        Observation {
            point,
            value,
            noise_variance: F::zero(),
        }
    }

    /// Set the noise variance
    pub fn with_noise(mut self, noise_variance: F) -> Self {
        self.noise_variance = noise_variance;
        self
    }
}

/// Gaussian Process with zero prior mean conditioned on a set of noisy observations
///
/// The posterior at query points `x*` is given by:
///
/// * mean: `k(x*, X) K^-1 y`
/// * covariance: `k(x*, x*) - k(x*, X) K^-1 k(X, x*)`
///
/// where `K = k(X, X) + diag(noise)` is factorized once as `L L^t`
/// (a small diagonal jitter may be added to make the factorization succeed).
///
/// A GP is immutable: conditioning on an additional (hypothetical) observation
/// with [`GaussianProcess::with_hypothetical_observation`] returns a new GP
/// obtained by extending the factorization by one row.
///
/// # Example
///
/// ```
/// use bayesopt_gp::{GaussianProcess, Kernel, KernelKind, Observation};
/// use ndarray::array;
///
/// let kernel = Kernel::new(KernelKind::SquaredExponential, 1, &[1.0, 0.3]).expect("valid kernel");
/// let observations = vec![
///     Observation::new(vec![0.0], 0.5),
///     Observation::new(vec![0.5], -0.2),
///     Observation::new(vec![1.0], 0.3).with_noise(0.01),
/// ];
/// let gp = GaussianProcess::construct(kernel, 1, &observations).expect("GP built");
///
/// let (mean, cov) = gp.posterior_mean_variance(&array![[0.25], [0.75]]).expect("posterior");
/// println!("mean = {mean}, covariance = {cov}");
///
/// // What-if branch: the receiver is untouched
/// let lied = gp.with_hypothetical_observation(&array![0.25], -1.0, 0.0).expect("extended");
/// assert_eq!(lied.n_obs(), gp.n_obs() + 1);
/// ```
#[derive(Clone, Debug)]
pub struct GaussianProcess<F: Float, K: CovarianceKernel<F> = Kernel<F>> {
    /// Parameters (kernel and regularization settings)
    params: GpValidParams<F, K>,
    /// Observed points (n, nx)
    xt: Array2<F>,
    /// Observed values (n,)
    yt: Array1<F>,
    /// Observation noise variances (n,)
    noise: Array1<F>,
    /// Lower cholesky factor of the regularized covariance matrix of observations
    chol: Array2<F>,
    /// Weights `K^-1 y`
    alpha: Array1<F>,
    /// Diagonal jitter added to K to get a successful factorization
    jitter: F,
}

impl<F: Float, K: CovarianceKernel<F>> fmt::Display for GaussianProcess<F, K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "GP(kernel={}, n_obs={}, jitter={})",
            self.params.kernel,
            self.n_obs(),
            self.jitter
        )
    }
}

impl<F: Float, K: CovarianceKernel<F>> GaussianProcess<F, K> {
    /// Gp parameters contructor
    pub fn params(kernel: K) -> GpParams<F, K> {
        GpParams::new(kernel)
    }

    /// Build a GP from a kernel, the input space dimension and observations
    /// using default regularization parameters.
    pub fn construct(kernel: K, dim: usize, observations: &[Observation<F>]) -> Result<Self> {
        Self::params(kernel).check()?.build(dim, observations)
    }

    /// Covariance kernel
    pub fn kernel(&self) -> &K {
        &self.params.kernel
    }

    /// Input space dimension
    pub fn dim(&self) -> usize {
        self.xt.ncols()
    }

    /// Number of observations
    pub fn n_obs(&self) -> usize {
        self.xt.nrows()
    }

    /// Observed points as a (n, nx) matrix
    pub fn observed_points(&self) -> &Array2<F> {
        &self.xt
    }

    /// Observed values
    pub fn observed_values(&self) -> &Array1<F> {
        &self.yt
    }

    /// Observation noise variances
    pub fn noise_variances(&self) -> &Array1<F> {
        &self.noise
    }

    /// Diagonal jitter which had to be added to factorize the covariance matrix
    pub fn jitter(&self) -> F {
        self.jitter
    }

    /// Minimum observed value and its location, `None` without observations
    pub fn best_observation(&self) -> Option<(Array1<F>, F)> {
        let mut best: Option<(usize, F)> = None;
        for (i, &y) in self.yt.iter().enumerate() {
            match best {
                Some((_, ymin)) if ymin <= y => {}
                _ => best = Some((i, y)),
            }
        }
        best.map(|(i, y)| (self.xt.row(i).to_owned(), y))
    }

    /// Minimum observed value, `None` without observations
    pub fn best_value(&self) -> Option<F> {
        self.best_observation().map(|(_, y)| y)
    }

    fn check_query(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<()> {
        self.check_dim(x.ncols())
    }

    fn check_dim(&self, nx: usize) -> Result<()> {
        if nx != self.dim() {
            return Err(GpError::ConfigurationError(format!(
                "query points dimension {} does not match GP dimension {}",
                nx,
                self.dim()
            )));
        }
        Ok(())
    }

    /// Solve `L v = b` for each column of `b`
    fn solve_lower(&self, b: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        if self.n_obs() == 0 {
            return Ok(Array2::zeros((0, b.ncols())));
        }
        Ok(self.chol.solve_triangular(b, UPLO::Lower)?)
    }

    /// Posterior mean vector and full covariance matrix at m given `x` points
    /// specified as a (m, nx) matrix.
    pub fn posterior_mean_variance(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array2<F>)> {
        self.check_query(x)?;
        let kernel = &self.params.kernel;
        let kx = kernel.cross_covariance(x, &self.xt);
        let mean = kx.dot(&self.alpha);
        let v = self.solve_lower(&kx.t())?;
        let mut cov = gram_matrix(kernel, x) - v.t().dot(&v);
        // enforce exact symmetry
        let m = cov.nrows();
        for i in 0..m {
            for j in (i + 1)..m {
                let c = (cov[[i, j]] + cov[[j, i]]) * F::cast(0.5);
                cov[[i, j]] = c;
                cov[[j, i]] = c;
            }
        }
        Ok((mean, cov))
    }

    /// Predict posterior mean values at n given `x` points of nx components specified as a (n, nx) matrix.
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.check_query(x)?;
        let kx = self.params.kernel.cross_covariance(x, &self.xt);
        Ok(kx.dot(&self.alpha))
    }

    /// Predict posterior variance values at n given `x` points of nx components specified as a (n, nx) matrix.
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        Ok(self.predict_valvar(x)?.1)
    }

    /// Predict both posterior mean and variance at n given `x` points of nx components
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array1<F>)> {
        self.check_query(x)?;
        let kernel = &self.params.kernel;
        let prior = kernel.signal_variance();
        if self.n_obs() == 0 {
            return Ok((Array1::zeros(x.nrows()), Array1::from_elem(x.nrows(), prior)));
        }
        let kx = kernel.cross_covariance(x, &self.xt);
        let mean = kx.dot(&self.alpha);
        let v = self.solve_lower(&kx.t())?;
        // Variance might be slightly negative depending on
        // machine precision: set to zero in that case
        let var = v.map_axis(Axis(0), |v_i| {
            let var = prior - v_i.fold(F::zero(), |acc, v| acc + *v * *v);
            if var < F::zero() {
                F::zero()
            } else {
                var
            }
        });
        Ok((mean, var))
    }

    /// `K^-1 b` for a (n, p) right hand side `b`
    fn solve_gram(&self, b: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        if self.n_obs() == 0 {
            return Ok(Array2::zeros((0, b.ncols())));
        }
        let w = self.chol.solve_triangular(b, UPLO::Lower)?;
        Ok(self.chol.t().solve_triangular(&w, UPLO::Upper)?)
    }

    /// Predict posterior mean gradient at a given `x` point of nx components
    pub fn predict_gradient_single(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Array1<F>> {
        self.check_dim(x.len())?;
        if self.n_obs() == 0 {
            return Ok(Array1::zeros(x.len()));
        }
        let jac = self.params.kernel.jacobian(x, &self.xt);
        Ok(jac.t().dot(&self.alpha))
    }

    /// Predict posterior variance gradient at a given `x` point of nx components
    pub fn predict_var_gradient_single(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Array1<F>> {
        self.check_dim(x.len())?;
        if self.n_obs() == 0 {
            return Ok(Array1::zeros(x.len()));
        }
        let kernel = &self.params.kernel;
        let kx = kernel.value(&crate::utils::differences(x, &self.xt));
        let jac = kernel.jacobian(x, &self.xt);
        // var(x) = k(x, x) - k(x, X) K^-1 k(X, x) where k(x, x) is constant (stationary kernel)
        let inv_kx = self.solve_gram(&kx.insert_axis(Axis(1)))?;
        let two = F::cast(2.);
        Ok(jac.t().dot(&inv_kx).column(0).mapv(|v| -two * v))
    }

    /// Predict posterior mean gradients at a set of points `x` specified as a (n, nx) matrix.
    /// Returns a (n, nx) matrix containing gradients at x wrt each nx components
    pub fn predict_gradients(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        self.check_query(x)?;
        let mut drv = Array2::<F>::zeros((x.nrows(), x.ncols()));
        for (mut row, xi) in drv.rows_mut().into_iter().zip(x.rows()) {
            row.assign(&self.predict_gradient_single(&xi)?);
        }
        Ok(drv)
    }

    /// Predict both posterior mean and variance gradients at a set of points `x` specified as a (n, nx) matrix
    /// where x has nx components.
    pub fn predict_valvar_gradients(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array2<F>, Array2<F>)> {
        self.check_query(x)?;
        let mut val_derivs = Array::zeros((x.nrows(), x.ncols()));
        let mut var_derivs = Array::zeros((x.nrows(), x.ncols()));
        for (i, xi) in x.rows().into_iter().enumerate() {
            val_derivs
                .row_mut(i)
                .assign(&self.predict_gradient_single(&xi)?);
            var_derivs
                .row_mut(i)
                .assign(&self.predict_var_gradient_single(&xi)?);
        }
        Ok((val_derivs, var_derivs))
    }

    /// Returns a new GP conditioned on the current observations plus
    /// the hypothetical observation `(x, value, noise_variance)`.
    ///
    /// The current GP is left untouched. The covariance factorization is extended
    /// by one row in O(n^2) and recomputed from scratch (with regularization) only
    /// when the extension is not numerically positive definite.
    pub fn with_hypothetical_observation(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        value: F,
        noise_variance: F,
    ) -> Result<Self> {
        check_observation(self.dim(), &x.to_vec(), value, noise_variance)?;
        let n = self.n_obs();
        let kernel = &self.params.kernel;
        let xnew = x.to_owned().insert_axis(Axis(0));

        let xt = concatenate![Axis(0), self.xt, xnew];
        let mut yt = self.yt.to_vec();
        yt.push(value);
        let yt = Array1::from_vec(yt);
        let mut noise = self.noise.to_vec();
        noise.push(noise_variance);
        let noise = Array1::from_vec(noise);

        let c = kernel.signal_variance() + noise_variance + self.jitter;
        let (chol, jitter) = if n == 0 {
            (Array2::from_elem((1, 1), c.sqrt()), self.jitter)
        } else {
            let k_new = kernel.value(&crate::utils::differences(x, &self.xt));
            let l = self.solve_lower(&k_new.insert_axis(Axis(1)))?.column(0).to_owned();
            let d2 = c - l.dot(&l);
            if d2.is_finite() && d2 > F::epsilon() * c {
                let mut chol = Array2::zeros((n + 1, n + 1));
                chol.slice_mut(s![..n, ..n]).assign(&self.chol);
                chol.slice_mut(s![n, ..n]).assign(&l);
                chol[[n, n]] = d2.sqrt();
                (chol, self.jitter)
            } else {
                debug!("Rank one extension not positive ({d2}), refactorize covariance matrix");
                let gram = covariance_with_noise(kernel, &xt, &noise);
                regularized_cholesky(
                    &gram,
                    self.params.nugget,
                    self.params.max_jitter_attempts,
                )?
            }
        };
        let alpha = solve_with_factor(&chol, &yt)?;
        Ok(GaussianProcess {
            params: self.params.clone(),
            xt,
            yt,
            noise,
            chol,
            alpha,
            jitter,
        })
    }

    /// Posterior mean vector at m given `x` points (m, nx) together with a (m, m) matrix `C`
    /// such that `C C^t` is the posterior covariance matrix.
    ///
    /// The covariance matrix is factorized with cholesky decomposition (regularized if needed)
    /// falling back to eigenvalues decomposition.
    pub fn posterior_mean_factor(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array2<F>)> {
        let (mean, cov) = self.posterior_mean_variance(x)?;
        let c = covariance_factor(&cov, self.params.nugget, self.params.max_jitter_attempts)?;
        Ok((mean, c))
    }

    /// Sample the posterior of the gaussian process at given `x` points (n, nx) for `n_traj` trajectories
    /// using the given random generator. Returns a (n, n_traj) matrix.
    pub fn sample_using<R: Rng>(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        n_traj: usize,
        rng: &mut R,
    ) -> Result<Array2<F>> {
        let (mean, c) = self.posterior_mean_factor(x)?;
        let ary = Array::random_using((x.nrows(), n_traj), StandardNormal, rng)
            .mapv(|v: f64| F::cast(v));
        Ok(mean.insert_axis(Axis(1)) + c.dot(&ary))
    }
}

impl<F: Float, K: CovarianceKernel<F>> GpValidParams<F, K> {
    /// Build the GP conditioned on the given observations of `dim`-dimensional points
    pub fn build(
        &self,
        dim: usize,
        observations: &[Observation<F>],
    ) -> Result<GaussianProcess<F, K>> {
        if dim != self.kernel.dim() {
            return Err(GpError::ConfigurationError(format!(
                "kernel dimension {} does not match input dimension {}",
                self.kernel.dim(),
                dim
            )));
        }
        let n = observations.len();
        let mut xt = Array2::zeros((n, dim));
        let mut yt = Array1::zeros(n);
        let mut noise = Array1::zeros(n);
        for (i, obs) in observations.iter().enumerate() {
            check_observation(dim, &obs.point, obs.value, obs.noise_variance)
                .map_err(|err| GpError::ConfigurationError(format!("observation {i}: {err}")))?;
            xt.row_mut(i).assign(&Array1::from_vec(obs.point.clone()));
            yt[i] = obs.value;
            noise[i] = obs.noise_variance;
        }

        let (chol, jitter) = if n == 0 {
            (Array2::zeros((0, 0)), F::zero())
        } else {
            let gram = covariance_with_noise(&self.kernel, &xt, &noise);
            regularized_cholesky(&gram, self.nugget, self.max_jitter_attempts)?
        };
        let alpha = if n == 0 {
            Array1::zeros(0)
        } else {
            solve_with_factor(&chol, &yt)?
        };
        debug!("GP built with {n} observations (jitter={jitter})");
        Ok(GaussianProcess {
            params: self.clone(),
            xt,
            yt,
            noise,
            chol,
            alpha,
            jitter,
        })
    }
}

fn check_observation<F: Float>(
    dim: usize,
    point: &[F],
    value: F,
    noise_variance: F,
) -> Result<()> {
    if point.len() != dim {
        return Err(GpError::ConfigurationError(format!(
            "point dimension {} does not match GP dimension {dim}",
            point.len()
        )));
    }
    if point.iter().any(|v| !v.is_finite()) {
        return Err(GpError::ConfigurationError(
            "point components should be finite".to_string(),
        ));
    }
    if !value.is_finite() {
        return Err(GpError::ConfigurationError(format!(
            "observed value should be finite, got {value}"
        )));
    }
    if !noise_variance.is_finite() || noise_variance < F::zero() {
        return Err(GpError::ConfigurationError(format!(
            "noise variance should be finite and non negative, got {noise_variance}"
        )));
    }
    Ok(())
}

/// `k(X, X) + diag(noise)`
fn covariance_with_noise<F: Float, K: CovarianceKernel<F>>(
    kernel: &K,
    xt: &Array2<F>,
    noise: &Array1<F>,
) -> Array2<F> {
    let mut gram = gram_matrix(kernel, xt);
    Zip::from(gram.diag_mut())
        .and(noise)
        .for_each(|g, n| *g += *n);
    gram
}

/// `(L L^t)^-1 y`
fn solve_with_factor<F: Float>(chol: &Array2<F>, yt: &Array1<F>) -> Result<Array1<F>> {
    let rhs = yt.to_owned().insert_axis(Axis(1));
    let w = chol.solve_triangular(&rhs, UPLO::Lower)?;
    let alpha = chol.t().solve_triangular_into(w, UPLO::Upper)?;
    Ok(alpha.column(0).to_owned())
}
