//! Experiment domain objects
//!
//! An [`Experiment`] couples a measured diffraction pattern with the
//! instrument and peak-profile parameters that describe how it was collected.
//! The beam mode and radiation probe are tagged enums; each combination gets
//! a fixed parameter set rather than a runtime-assembled one.

pub mod instrument;
pub mod pattern;
pub mod peak;

pub use instrument::InstrumentSetup;
pub use pattern::Pattern;
pub use peak::PeakProfile;

use crate::parameters::{Parameter, ParameterSource};
use serde::{Deserialize, Serialize};

/// How the diffraction signal was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeamMode {
    ConstantWavelength,
    TimeOfFlight,
}

/// Radiation used for the measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadiationProbe {
    Neutron,
    Xray,
}

/// A single diffraction experiment: measured data plus instrument model.
#[derive(Debug)]
pub struct Experiment {
    pub id: String,
    pub beam_mode: BeamMode,
    pub radiation_probe: RadiationProbe,
    pub instrument: InstrumentSetup,
    pub peak: PeakProfile,
    pub pattern: Pattern,
}

impl Experiment {
    /// Create an experiment with default instrument and profile parameters
    /// for the given beam mode.
    pub fn new(id: &str, beam_mode: BeamMode, radiation_probe: RadiationProbe) -> Self {
        let (instrument, peak) = match beam_mode {
            BeamMode::ConstantWavelength => (
                InstrumentSetup::constant_wavelength(),
                PeakProfile::pseudo_voigt(),
            ),
            BeamMode::TimeOfFlight => (
                InstrumentSetup::time_of_flight(),
                PeakProfile::tof_pseudo_voigt(),
            ),
        };

        Self {
            id: id.to_string(),
            beam_mode,
            radiation_probe,
            instrument,
            peak,
            pattern: Pattern::new(),
        }
    }

    /// Owned components in fixed declaration order: instrument, then peak.
    pub fn components(&self) -> Vec<&dyn ParameterSource> {
        vec![&self.instrument, &self.peak]
    }

    pub fn components_mut(&mut self) -> Vec<&mut dyn ParameterSource> {
        vec![&mut self.instrument, &mut self.peak]
    }
}

/// Insertion-ordered collection of experiments.
#[derive(Debug, Default)]
pub struct Experiments {
    experiments: Vec<Experiment>,
}

impl Experiments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, experiment: Experiment) {
        self.experiments.push(experiment);
    }

    pub fn get(&self, id: &str) -> Option<&Experiment> {
        self.experiments.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Experiment> {
        self.experiments.iter_mut().find(|e| e.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.experiments.iter().map(|e| e.id.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Experiment> {
        self.experiments.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Experiment> {
        self.experiments.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// All free parameters across all experiments, in deterministic order.
    pub fn free_parameters(&self) -> Vec<&Parameter> {
        self.experiments
            .iter()
            .flat_map(|e| e.components())
            .flat_map(|c| c.parameters())
            .filter(|p| p.free())
            .collect()
    }

    /// Total number of measured points across all experiments.
    pub fn total_points(&self) -> usize {
        self.experiments.iter().map(|e| e.pattern.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experiment_construction_per_beam_mode() {
        let cw = Experiment::new("npd", BeamMode::ConstantWavelength, RadiationProbe::Neutron);
        assert!(matches!(cw.instrument, InstrumentSetup::ConstantWavelength { .. }));
        assert!(matches!(cw.peak, PeakProfile::PseudoVoigt { .. }));

        let tof = Experiment::new("tof", BeamMode::TimeOfFlight, RadiationProbe::Neutron);
        assert!(matches!(tof.instrument, InstrumentSetup::TimeOfFlight { .. }));
        assert!(matches!(tof.peak, PeakProfile::TofPseudoVoigt { .. }));
    }

    #[test]
    fn test_experiments_free_parameter_order() {
        let mut experiments = Experiments::new();
        let mut expt = Experiment::new("npd", BeamMode::ConstantWavelength, RadiationProbe::Neutron);
        if let InstrumentSetup::ConstantWavelength {
            wavelength,
            twotheta_offset,
        } = &mut expt.instrument
        {
            twotheta_offset.set_free(true);
            wavelength.set_free(true);
        }
        experiments.add(expt);

        // Declaration order within the component, not the order flags were set.
        let names: Vec<&str> = experiments
            .free_parameters()
            .iter()
            .map(|p| p.cif_name.as_str())
            .collect();
        assert_eq!(names, vec!["wavelength", "2theta_offset"]);
    }
}
