//! Fitting input validation errors.
//!
//! Numerical degeneracies (singular systems, ill-conditioned covariances)
//! are absorbed inside the optimizers and never surface here; these errors
//! only reject malformed inputs at the API boundary.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("input arrays must not be empty")]
    EmptyInput,
    #[error("input arrays must have the same length ({x_len} vs {y_len})")]
    MismatchedLengths { x_len: usize, y_len: usize },
    #[error("input data contains non-finite values")]
    NonFiniteData,
    #[error("at least {needed} data points are required, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("bounds are malformed: {reason}")]
    InvalidBounds { reason: String },
}
