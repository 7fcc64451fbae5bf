use thiserror::Error;

/// A result type for EGO errors
pub type Result<T> = std::result::Result<T, EgoError>;

/// An error for next points selection
#[derive(Error, Debug)]
pub enum EgoError {
    /// When configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfigError(String),
    /// When GP construction or prediction fails
    #[error(transparent)]
    GpError(#[from] bayesopt_gp::GpError),
    /// When the domain is ill-defined
    #[error(transparent)]
    DoeError(#[from] bayesopt_doe::DoeError),
    /// When a cancellation request is observed
    #[error("Cancelled")]
    Cancelled,
}

impl EgoError {
    /// Whether the error comes from an ill-defined input (domain, kernel, observations or parameters)
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            EgoError::InvalidConfigError(_)
                | EgoError::DoeError(_)
                | EgoError::GpError(bayesopt_gp::GpError::ConfigurationError(_))
        )
    }
}
