//! Pattern calculator contract
//!
//! A calculator turns sample models plus an experiment description into a
//! calculated intensity curve aligned with the experiment's measured x-grid.
//! The engine never reimplements diffraction physics; it only calls this
//! contract. Implementations wrap external engines (cryspy/crysfml-style) or
//! synthetic models for testing.

use crate::error::Result;
use crate::experiment::Experiment;
use crate::model::SampleModels;
use ndarray::Array1;

/// External collaborator computing diffraction patterns.
///
/// `calculate_pattern` must return intensities aligned with
/// `experiment.pattern.x()` and must be pure given its inputs. It may fail on
/// an unsupported configuration (e.g. a radiation probe the engine cannot
/// handle); such errors are propagated unmodified and never retried.
pub trait Calculator {
    /// Short name of the calculation engine.
    fn name(&self) -> &str;

    /// Compute the diffraction pattern for one experiment.
    fn calculate_pattern(
        &self,
        sample_models: &SampleModels,
        experiment: &Experiment,
    ) -> Result<Array1<f64>>;
}

/// Adapter turning a closure into a [`Calculator`].
///
/// Lets embedders and tests supply a synthetic pattern function without a
/// full physics engine.
pub struct FnCalculator<F>
where
    F: Fn(&SampleModels, &Experiment) -> Result<Array1<f64>>,
{
    name: String,
    func: F,
}

impl<F> FnCalculator<F>
where
    F: Fn(&SampleModels, &Experiment) -> Result<Array1<f64>>,
{
    pub fn new(name: &str, func: F) -> Self {
        Self {
            name: name.to_string(),
            func,
        }
    }
}

impl<F> Calculator for FnCalculator<F>
where
    F: Fn(&SampleModels, &Experiment) -> Result<Array1<f64>>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn calculate_pattern(
        &self,
        sample_models: &SampleModels,
        experiment: &Experiment,
    ) -> Result<Array1<f64>> {
        (self.func)(sample_models, experiment)
    }
}
