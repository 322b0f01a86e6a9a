use thiserror::Error;

/// Errors raised by the numerical core of the optimizer
///
/// All of these indicate a caller or configuration bug rather than a transient
/// condition, so none of them are retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NewtonError {
    /// A flat vector does not hold exactly as many elements as the target shapes
    #[error("shape mismatch: shapes hold {expected} elements but the vector has {found}")]
    ShapeMismatch { expected: usize, found: usize },
    /// Structured arguments (tensor lists, cotangents) disagree in count or shape
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),
    /// The number of chunks in an accumulation pass differs from the configured segment count
    #[error("expected {expected} segments for a {mode} pass, found {found}")]
    SegmentMismatch {
        mode: String,
        expected: usize,
        found: usize,
    },
    #[error("unknown accumulation mode `{0}`, expected one of funonly, fungrad, Gv")]
    UnknownMode(String),
}

impl NewtonError {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        NewtonError::PreconditionViolation(msg.into())
    }

    pub(crate) fn dimension(msg: impl Into<String>) -> Self {
        NewtonError::DimensionMismatch(msg.into())
    }
}
