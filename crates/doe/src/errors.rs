use thiserror::Error;

/// A result type for design space handling
pub type Result<T> = std::result::Result<T, DoeError>;

/// An error raised when a [`Domain`](crate::Domain) is ill-defined or misused
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DoeError {
    /// When a lower bound is greater than its upper bound
    #[error("Invalid bounds for dimension {dim}: lower bound {low} > upper bound {high}")]
    InvalidBounds {
        /// Index of the faulty dimension
        dim: usize,
        /// Given lower bound
        low: f64,
        /// Given upper bound
        high: f64,
    },
    /// When a bound is NaN or infinite
    #[error("Non finite bound for dimension {0}")]
    NonFiniteBound(usize),
    /// When no dimension is given
    #[error("Empty domain: at least one dimension is required")]
    EmptyDomain,
    /// When bounds are not given as (lower, upper) pairs
    #[error("Bounds should be given as a (nx, 2) matrix, got {0} columns")]
    BadBoundsShape(usize),
    /// When a point dimension does not match the domain one
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Domain dimension
        expected: usize,
        /// Given point dimension
        actual: usize,
    },
}
