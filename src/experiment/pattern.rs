//! Measured and calculated pattern storage

use crate::error::{RefineError, Result};
use ndarray::Array1;

/// Diffraction pattern data for one experiment.
///
/// Holds the measured grid (`x`, `meas`, `meas_su`), an externally resolved
/// background contribution (`bkg`), and the most recent calculated intensities
/// (`calc`, cached by the orchestrator after a fit).
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    x: Option<Array1<f64>>,
    meas: Option<Array1<f64>>,
    meas_su: Option<Array1<f64>>,
    bkg: Option<Array1<f64>>,
    calc: Option<Array1<f64>>,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store measured data. When `meas_su` is `None`, uncertainties default
    /// to `sqrt(|meas|)` (counting statistics).
    pub fn set_measured_data(
        &mut self,
        x: Array1<f64>,
        meas: Array1<f64>,
        meas_su: Option<Array1<f64>>,
    ) -> Result<()> {
        if x.len() != meas.len() {
            return Err(RefineError::DimensionMismatch(format!(
                "x has {} points but meas has {}",
                x.len(),
                meas.len()
            )));
        }

        let su = match meas_su {
            Some(su) => {
                if su.len() != meas.len() {
                    return Err(RefineError::DimensionMismatch(format!(
                        "meas has {} points but meas_su has {}",
                        meas.len(),
                        su.len()
                    )));
                }
                su
            }
            None => meas.mapv(|y| y.abs().sqrt()),
        };

        self.x = Some(x);
        self.meas = Some(meas);
        self.meas_su = Some(su);
        self.calc = None;

        Ok(())
    }

    /// Set the externally resolved background contribution.
    pub fn set_background(&mut self, bkg: Array1<f64>) -> Result<()> {
        if let Some(x) = &self.x {
            if bkg.len() != x.len() {
                return Err(RefineError::DimensionMismatch(format!(
                    "x has {} points but background has {}",
                    x.len(),
                    bkg.len()
                )));
            }
        }
        self.bkg = Some(bkg);
        Ok(())
    }

    pub fn x(&self) -> Option<&Array1<f64>> {
        self.x.as_ref()
    }

    pub fn meas(&self) -> Option<&Array1<f64>> {
        self.meas.as_ref()
    }

    pub fn meas_su(&self) -> Option<&Array1<f64>> {
        self.meas_su.as_ref()
    }

    pub fn bkg(&self) -> Option<&Array1<f64>> {
        self.bkg.as_ref()
    }

    /// Most recent calculated intensities, if any.
    pub fn calc(&self) -> Option<&Array1<f64>> {
        self.calc.as_ref()
    }

    pub fn set_calc(&mut self, calc: Array1<f64>) {
        self.calc = Some(calc);
    }

    /// Number of measured data points (0 when no data is loaded).
    pub fn len(&self) -> usize {
        self.x.as_ref().map_or(0, |x| x.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_measured_data(&self) -> bool {
        self.x.is_some() && self.meas.is_some() && self.meas_su.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_set_measured_data_with_su() {
        let mut pattern = Pattern::new();
        pattern
            .set_measured_data(
                array![1.0, 2.0, 3.0],
                array![10.0, 20.0, 30.0],
                Some(array![1.0, 1.0, 1.0]),
            )
            .unwrap();

        assert!(pattern.has_measured_data());
        assert_eq!(pattern.len(), 3);
        assert_eq!(pattern.meas_su().unwrap()[0], 1.0);
    }

    #[test]
    fn test_default_uncertainty_is_sqrt_of_counts() {
        let mut pattern = Pattern::new();
        pattern
            .set_measured_data(array![1.0, 2.0], array![100.0, 25.0], None)
            .unwrap();

        let su = pattern.meas_su().unwrap();
        assert_relative_eq!(su[0], 10.0);
        assert_relative_eq!(su[1], 5.0);
    }

    #[test]
    fn test_length_validation() {
        let mut pattern = Pattern::new();
        let err = pattern.set_measured_data(array![1.0, 2.0], array![10.0], None);
        assert!(err.is_err());

        let err = pattern.set_measured_data(
            array![1.0, 2.0],
            array![10.0, 20.0],
            Some(array![1.0]),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_background_length_validation() {
        let mut pattern = Pattern::new();
        pattern
            .set_measured_data(array![1.0, 2.0], array![10.0, 20.0], None)
            .unwrap();

        assert!(pattern.set_background(array![1.0]).is_err());
        assert!(pattern.set_background(array![1.0, 2.0]).is_ok());
    }
}
