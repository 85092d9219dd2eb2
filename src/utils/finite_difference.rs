//! Finite difference methods for numerical differentiation.
//!
//! The residual function recomputes a full diffraction pattern per call and
//! offers no analytic derivatives, so the Jacobian is always approximated by
//! forward differences with a scale-adapted step.

use crate::error::{RefineError, Result};
use ndarray::{Array1, Array2};

/// Default relative step size for finite differences.
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Compute the Jacobian matrix using forward finite differences.
///
/// J[i,j] = ∂residual[i]/∂param[j]. `residuals_at_params` must be the
/// residual vector already evaluated at `params`, so one evaluation is
/// reused instead of recomputed.
///
/// The objective is `FnMut` because evaluating it synchronizes parameter
/// values onto the live model objects.
pub fn jacobian<F>(
    mut eval: F,
    params: &Array1<f64>,
    residuals_at_params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>>
where
    F: FnMut(&Array1<f64>) -> Result<Array1<f64>>,
{
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = residuals_at_params.len();

    let mut jac = Array2::zeros((n_residuals, n_params));

    for j in 0..n_params {
        let mut params_perturbed = params.clone();

        // Adapt epsilon to parameter scale
        let param_j = params[j];
        let eps_j = if param_j.abs() > eps {
            param_j.abs() * eps.sqrt()
        } else {
            eps.sqrt()
        };

        params_perturbed[j] += eps_j;

        let residuals_perturbed = eval(&params_perturbed)?;
        if residuals_perturbed.len() != n_residuals {
            return Err(RefineError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                n_residuals,
                residuals_perturbed.len()
            )));
        }

        for i in 0..n_residuals {
            jac[[i, j]] = (residuals_perturbed[i] - residuals_at_params[i]) / eps_j;
        }
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_jacobian_of_linear_residuals() {
        // r(p) = [2*p0 + p1, p0 - 3*p1]
        let eval = |p: &Array1<f64>| -> Result<Array1<f64>> {
            Ok(array![2.0 * p[0] + p[1], p[0] - 3.0 * p[1]])
        };

        let params = array![1.0, 2.0];
        let r0 = eval(&params).unwrap();
        let jac = jacobian(eval, &params, &r0, None).unwrap();

        assert_eq!(jac.shape(), &[2, 2]);
        assert_relative_eq!(jac[[0, 0]], 2.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[0, 1]], 1.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[1, 0]], 1.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[1, 1]], -3.0, epsilon = 1e-5);
    }
}
