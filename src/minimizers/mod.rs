//! Minimization engines and the machinery shared between them.
//!
//! Backends are interchangeable behind the [`Minimizer`] trait and are
//! selected by name through [`create_minimizer`]. They all consume the same
//! [`ResidualProblem`] and [`FreeParameterSet`], so switching engines between
//! fits requires no other reconfiguration.

pub mod derivative_free;
pub mod free_set;
pub mod least_squares;
pub mod residual;
pub mod tracker;

pub use derivative_free::{DerivativeFreeConfig, DerivativeFreeMinimizer};
pub use free_set::{free_parameters_mut, FreeParam, FreeParameterSet};
pub use least_squares::{Decomposition, LeastSquaresConfig, LeastSquaresMinimizer};
pub use residual::ResidualProblem;
pub use tracker::{ChiSquareTracker, ConvergenceRecord, ConvergenceSummary};

use crate::error::{RefineError, Result};
use ndarray::Array1;

/// Raw output of one backend run, before synchronization back onto the model.
#[derive(Debug, Clone)]
pub struct MinimizerResult {
    /// Optimized parameter values, aligned with the free parameter set.
    pub values: Array1<f64>,

    /// Parameter standard errors, when the backend can estimate them.
    pub stderr: Option<Array1<f64>>,

    /// Sum of squared residuals at the solution.
    pub cost: f64,

    /// Number of objective evaluations.
    pub nfev: usize,

    /// Number of backend iterations performed.
    pub iterations: usize,

    /// Whether the backend's own convergence criteria were met.
    pub success: bool,

    /// Human-readable outcome description.
    pub message: String,

    /// Backend-specific extras, serialized for reporting.
    pub diagnostics: serde_json::Value,
}

/// A pluggable minimization engine.
pub trait Minimizer {
    /// Registry name of this engine.
    fn name(&self) -> &'static str;

    /// Run the optimization from the starting point captured in `params`.
    ///
    /// Backends return `Ok` with `success: false` when they ran but failed
    /// their own convergence criteria; `Err` is reserved for evaluation
    /// failures and broken configurations.
    fn fit(
        &self,
        problem: &mut ResidualProblem<'_>,
        params: &FreeParameterSet,
    ) -> Result<MinimizerResult>;
}

impl std::fmt::Debug for dyn Minimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Minimizer").field("name", &self.name()).finish()
    }
}

/// Instantiate a minimizer by registry name.
///
/// Recognized names: `leastsq` (alias for `leastsq (cholesky)`),
/// `leastsq (cholesky)`, `leastsq (svd)`, and `neldermead`.
pub fn create_minimizer(name: &str) -> Result<Box<dyn Minimizer>> {
    match name {
        "leastsq" | "leastsq (cholesky)" => Ok(Box::new(LeastSquaresMinimizer::new())),
        "leastsq (svd)" => Ok(Box::new(
            LeastSquaresMinimizer::new().with_decomposition(Decomposition::Svd),
        )),
        "neldermead" => Ok(Box::new(DerivativeFreeMinimizer::new())),
        other => Err(RefineError::Configuration(format!(
            "unknown minimizer '{}'; available: {}",
            other,
            available_minimizers().join(", ")
        ))),
    }
}

/// Names accepted by [`create_minimizer`].
pub fn available_minimizers() -> Vec<&'static str> {
    vec![
        "leastsq",
        "leastsq (cholesky)",
        "leastsq (svd)",
        "neldermead",
    ]
}
