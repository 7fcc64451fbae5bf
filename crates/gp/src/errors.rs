use thiserror::Error;

/// A result type for GP regression algorithm
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when using [`GaussianProcess`](crate::GaussianProcess) or a [`CovarianceKernel`](crate::CovarianceKernel)
#[derive(Error, Debug)]
pub enum GpError {
    /// When kernel, observations or parameters are ill-defined
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),
    /// When the covariance matrix cannot be factorized even after regularization
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
}
