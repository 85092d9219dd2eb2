//! Damped least-squares backend.
//!
//! Levenberg-Marquardt with finite-difference Jacobians: at each iteration the
//! damped normal equations `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr` are solved for a
//! step, which is clamped into the parameter bounds before evaluation. Steps
//! that reduce the cost are accepted and relax the damping; rejected steps
//! stiffen it. Parameter uncertainties come from the covariance matrix
//! `redχ²·(JᵀJ)⁻¹` at the solution.

use nalgebra::{DMatrix, DVector};
use ndarray::Array1;
use serde_json::json;
use tracing::debug;

use crate::error::{RefineError, Result};
use crate::minimizers::free_set::FreeParameterSet;
use crate::minimizers::residual::ResidualProblem;
use crate::minimizers::{Minimizer, MinimizerResult};
use crate::utils::finite_difference::jacobian;
use crate::utils::matrix_convert::{
    nalgebra_to_ndarray, nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};

/// Singular-value cutoff for the SVD solve and the pseudo-inverse.
const SVD_EPSILON: f64 = 1e-12;

/// Method used to solve the damped normal equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decomposition {
    /// Cholesky factorization, falling back to SVD when the damped normal
    /// matrix is not positive definite.
    Cholesky,

    /// Singular value decomposition. Slower, tolerant of rank deficiency.
    Svd,
}

/// Configuration options for the least-squares backend.
#[derive(Debug, Clone)]
pub struct LeastSquaresConfig {
    /// Maximum number of accepted steps.
    pub max_iterations: usize,

    /// Relative tolerance on cost reduction.
    pub ftol: f64,

    /// Relative tolerance on the step size.
    pub xtol: f64,

    /// Initial value of the damping parameter.
    pub initial_lambda: f64,

    /// Factor applied to lambda when a step is rejected.
    pub lambda_up_factor: f64,

    /// Factor applied to lambda when a step is accepted.
    pub lambda_down_factor: f64,

    /// Damping above which the fit is abandoned as non-convergent.
    pub max_lambda: f64,

    /// Linear solver for the normal equations.
    pub decomposition: Decomposition,
}

impl Default for LeastSquaresConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            ftol: 1e-8,
            xtol: 1e-8,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            max_lambda: 1e10,
            decomposition: Decomposition::Cholesky,
        }
    }
}

/// Levenberg-Marquardt minimizer.
#[derive(Debug, Clone, Default)]
pub struct LeastSquaresMinimizer {
    config: LeastSquaresConfig,
}

impl LeastSquaresMinimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LeastSquaresConfig) -> Self {
        Self { config }
    }

    /// Set the maximum number of accepted steps.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the relative tolerance on cost reduction.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    /// Set the relative tolerance on the step size.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    /// Set the initial damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    /// Set the linear solver for the normal equations.
    pub fn with_decomposition(mut self, decomposition: Decomposition) -> Self {
        self.config.decomposition = decomposition;
        self
    }

    /// Solve the damped normal equations for a step.
    fn solve_step(&self, jtj_damped: &DMatrix<f64>, jtr: &DVector<f64>) -> Option<DVector<f64>> {
        let rhs = -jtr;
        match self.config.decomposition {
            Decomposition::Cholesky => match jtj_damped.clone().cholesky() {
                Some(chol) => Some(chol.solve(&rhs)),
                None => Self::svd_solve(jtj_damped, &rhs),
            },
            Decomposition::Svd => Self::svd_solve(jtj_damped, &rhs),
        }
    }

    fn svd_solve(a: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
        a.clone().svd(true, true).solve(rhs, SVD_EPSILON).ok()
    }

    /// Parameter standard errors from `redχ²·(JᵀJ)⁻¹` at the solution.
    fn standard_errors(jtj: &DMatrix<f64>, red_chi2: f64) -> Option<Array1<f64>> {
        let inverse = match jtj.clone().cholesky() {
            Some(chol) => chol.inverse(),
            None => jtj.clone().pseudo_inverse(SVD_EPSILON).ok()?,
        };
        let covariance = nalgebra_to_ndarray(&inverse).mapv(|c| red_chi2 * c);

        let variances: Vec<f64> = covariance.diag().iter().copied().collect();

        if variances.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return None;
        }

        Some(Array1::from_iter(variances.into_iter().map(f64::sqrt)))
    }
}

impl Minimizer for LeastSquaresMinimizer {
    fn name(&self) -> &'static str {
        match self.config.decomposition {
            Decomposition::Cholesky => "leastsq (cholesky)",
            Decomposition::Svd => "leastsq (svd)",
        }
    }

    fn fit(
        &self,
        problem: &mut ResidualProblem<'_>,
        params: &FreeParameterSet,
    ) -> Result<MinimizerResult> {
        let mut x = params.clamp(&params.initial_values());
        let mut residuals = problem.eval(&x)?;
        let mut cost: f64 = residuals.iter().map(|r| r.powi(2)).sum();

        let dof = problem
            .residual_count()
            .saturating_sub(params.len())
            .max(1);

        let mut lambda = self.config.initial_lambda;
        let mut iterations = 0;
        let mut converged = false;
        let mut message = format!(
            "did not converge within {} iterations",
            self.config.max_iterations
        );
        let mut jtj_at_solution: Option<DMatrix<f64>> = None;

        'outer: for iteration in 1..=self.config.max_iterations {
            iterations = iteration;

            let jac = jacobian(|p| problem.eval(p), &x, &residuals, None)?;
            let j = ndarray_to_nalgebra(&jac);
            let r = ndarray_vec_to_nalgebra(&residuals);
            let jtj = j.transpose() * &j;
            let jtr = j.transpose() * &r;

            // Try steps with increasing damping until one reduces the cost.
            loop {
                let mut damped = jtj.clone();
                for i in 0..damped.nrows() {
                    damped[(i, i)] += lambda * jtj[(i, i)].max(f64::EPSILON);
                }

                let delta = match self.solve_step(&damped, &jtr) {
                    Some(delta) => delta,
                    None => return Err(RefineError::SingularMatrix),
                };

                let candidate = params.clamp(&(&x + &nalgebra_vec_to_ndarray(&delta)));
                let step = &candidate - &x;
                let candidate_residuals = problem.eval(&candidate)?;
                let candidate_cost: f64 =
                    candidate_residuals.iter().map(|r| r.powi(2)).sum();

                if candidate_cost < cost {
                    let reduction = (cost - candidate_cost) / cost.max(f64::EPSILON);
                    let step_norm = step.iter().map(|d| d.powi(2)).sum::<f64>().sqrt();
                    let x_norm = x.iter().map(|v| v.powi(2)).sum::<f64>().sqrt();

                    x = candidate;
                    residuals = candidate_residuals;
                    cost = candidate_cost;
                    lambda = (lambda * self.config.lambda_down_factor).max(f64::MIN_POSITIVE);
                    jtj_at_solution = Some(jtj);

                    debug!(
                        iteration,
                        cost,
                        lambda,
                        reduction,
                        "step accepted"
                    );

                    if reduction < self.config.ftol {
                        converged = true;
                        message = "converged: relative cost reduction below ftol".to_string();
                        break 'outer;
                    }
                    if step_norm < self.config.xtol * (x_norm + self.config.xtol) {
                        converged = true;
                        message = "converged: step size below xtol".to_string();
                        break 'outer;
                    }
                    break;
                }

                lambda *= self.config.lambda_up_factor;
                debug!(iteration, lambda, "step rejected");

                if lambda > self.config.max_lambda {
                    message = "damping exceeded maximum, no downhill step found".to_string();
                    break 'outer;
                }
            }
        }

        // Park the model state at the solution.
        let final_residuals = problem.eval(&x)?;
        let final_cost: f64 = final_residuals.iter().map(|r| r.powi(2)).sum();
        let red_chi2 = final_cost / dof as f64;

        let stderr = if converged {
            jtj_at_solution
                .as_ref()
                .and_then(|jtj| Self::standard_errors(jtj, red_chi2))
        } else {
            None
        };

        Ok(MinimizerResult {
            values: x,
            stderr,
            cost: final_cost,
            nfev: problem.tracker().evaluations(),
            iterations,
            success: converged,
            message,
            diagnostics: json!({
                "engine": self.name(),
                "lambda": lambda,
                "reduced_chi_square": red_chi2,
            }),
        })
    }
}
