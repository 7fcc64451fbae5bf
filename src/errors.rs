use bayesopt_doe::DoeError;
use bayesopt_ego::EgoError;
use bayesopt_gp::GpError;
use thiserror::Error;

/// A result type for request handling
pub type Result<T> = std::result::Result<T, BayesoptError>;

/// An error when handling a request
#[derive(Error, Debug)]
pub enum BayesoptError {
    /// When the request is malformed (inconsistent dimensions, missing data)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// When the domain is ill-defined
    #[error(transparent)]
    DoeError(#[from] DoeError),
    /// When the GP cannot be built or queried
    #[error(transparent)]
    GpError(#[from] GpError),
    /// When next points selection fails
    #[error(transparent)]
    EgoError(#[from] EgoError),
}

impl BayesoptError {
    /// Whether the error comes from an invalid input rather than from computation
    pub fn is_configuration_error(&self) -> bool {
        match self {
            BayesoptError::InvalidRequest(_) | BayesoptError::DoeError(_) => true,
            BayesoptError::GpError(GpError::ConfigurationError(_)) => true,
            BayesoptError::GpError(_) => false,
            BayesoptError::EgoError(err) => err.is_configuration_error(),
        }
    }
}
