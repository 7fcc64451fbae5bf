use crate::errors::{GpError, Result};
use crate::kernels::CovarianceKernel;
use linfa::{Float, ParamGuard};

/// Default maximum number of jitter increases tried to stabilize the covariance factorization
pub const GP_MAX_JITTER_ATTEMPTS: usize = 10;

/// A set of validated GP parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct GpValidParams<F: Float, K: CovarianceKernel<F>> {
    /// Covariance kernel k(x, x')
    pub(crate) kernel: K,
    /// Initial relative diagonal jitter used when the covariance matrix is not numerically positive definite
    pub(crate) nugget: F,
    /// Number of jitter increases (x10 each) before giving up
    pub(crate) max_jitter_attempts: usize,
}

impl<F: Float, K: CovarianceKernel<F>> GpValidParams<F, K> {
    /// Get covariance kernel k(x, x')
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Get the nugget
    pub fn nugget(&self) -> F {
        self.nugget
    }

    /// Get the maximum number of regularization attempts
    pub fn max_jitter_attempts(&self) -> usize {
        self.max_jitter_attempts
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the construction of
/// a [GaussianProcess](crate::GaussianProcess).
pub struct GpParams<F: Float, K: CovarianceKernel<F>>(GpValidParams<F, K>);

impl<F: Float, K: CovarianceKernel<F>> GpParams<F, K> {
    /// A constructor for GP parameters given a covariance kernel
    pub fn new(kernel: K) -> GpParams<F, K> {
        Self(GpValidParams {
            kernel,
            nugget: F::cast(100.0) * F::epsilon(),
            max_jitter_attempts: GP_MAX_JITTER_ATTEMPTS,
        })
    }

    /// A constructor for GP parameters from validated parameters
    pub fn new_from_valid(params: &GpValidParams<F, K>) -> Self {
        Self(params.clone())
    }

    /// Set covariance kernel.
    pub fn kernel(mut self, kernel: K) -> Self {
        self.0.kernel = kernel;
        self
    }

    /// Set nugget.
    ///
    /// Nugget is the initial diagonal jitter, relative to the mean prior variance,
    /// added when the covariance matrix factorization fails.
    pub fn nugget(mut self, nugget: F) -> Self {
        self.0.nugget = nugget;
        self
    }

    /// Set the maximum number of jitter increases before reporting a numerical instability
    pub fn max_jitter_attempts(mut self, max_jitter_attempts: usize) -> Self {
        self.0.max_jitter_attempts = max_jitter_attempts;
        self
    }
}

impl<F: Float, K: CovarianceKernel<F>> From<GpValidParams<F, K>> for GpParams<F, K> {
    fn from(valid: GpValidParams<F, K>) -> Self {
        GpParams(valid)
    }
}

impl<F: Float, K: CovarianceKernel<F>> ParamGuard for GpParams<F, K> {
    type Checked = GpValidParams<F, K>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if !self.0.nugget.is_finite() || self.0.nugget <= F::zero() {
            return Err(GpError::ConfigurationError(format!(
                "`nugget` should be finite and strictly positive, got {}",
                self.0.nugget
            )));
        }
        if self.0.kernel.dim() == 0 {
            return Err(GpError::ConfigurationError(
                "kernel dimension should be greater than 0".to_string(),
            ));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{Kernel, KernelKind};

    #[test]
    fn test_params_check() {
        let kernel = Kernel::new(KernelKind::SquaredExponential, 2, &[1., 0.5]).unwrap();
        let params = GpParams::new(kernel.clone()).max_jitter_attempts(3);
        let valid = params.check_ref().unwrap();
        assert_eq!(valid.max_jitter_attempts(), 3);
        assert_eq!(valid.kernel(), &kernel);

        assert!(GpParams::new(kernel.clone()).nugget(0.).check().is_err());
        assert!(GpParams::new(kernel).nugget(f64::NAN).check().is_err());
    }
}
