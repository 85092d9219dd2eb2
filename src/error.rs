use thiserror::Error;

/// Error types for the pdrefine library.
#[derive(Error, Debug)]
pub enum RefineError {
    /// Configuration problem detected before any optimizer call: no
    /// calculator assigned, empty model/experiment collections, an unknown
    /// minimizer name, or a sanitized parameter-id collision.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Measured data required for residual computation is absent.
    #[error("Missing measured data: {0}")]
    MissingData(String),

    /// Reduced chi-square is undefined: the number of data points does not
    /// exceed the number of free parameters.
    #[error(
        "Degrees of freedom exhausted: {n_points} data points for {n_free} free parameters"
    )]
    DegreesOfFreedom { n_points: usize, n_free: usize },

    /// Error raised by the pattern calculator; propagated unmodified.
    #[error("Calculator error: {0}")]
    Calculator(String),

    /// Mismatch between vector/matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error for parameter-related problems.
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// Error for boundary constraint violations.
    #[error("Bounds error: {0}")]
    Bounds(String),

    /// A singular matrix was encountered while solving the normal equations.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// The minimizer failed to converge.
    #[error("Minimizer failed to converge: {0}")]
    ConvergenceFailure(String),
}

impl From<crate::parameters::BoundsError> for RefineError {
    fn from(err: crate::parameters::BoundsError) -> Self {
        RefineError::Bounds(format!("{}", err))
    }
}

/// Result type alias for pdrefine operations.
pub type Result<T> = std::result::Result<T, RefineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RefineError::Configuration("no calculator assigned".to_string());
        assert!(format!("{}", err).contains("no calculator assigned"));

        let err = RefineError::DegreesOfFreedom {
            n_points: 3,
            n_free: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("3 data points"));
        assert!(msg.contains("3 free parameters"));
    }

    #[test]
    fn test_bounds_error_conversion() {
        let bounds_err = crate::parameters::BoundsError::InvalidBounds { min: 2.0, max: 1.0 };
        let err: RefineError = bounds_err.into();
        match err {
            RefineError::Bounds(_) => (),
            _ => panic!("Expected Bounds variant"),
        }
    }
}
