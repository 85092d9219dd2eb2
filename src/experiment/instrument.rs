//! Instrument setup components
//!
//! One fixed parameter struct per beam mode; dispatch is by pattern matching
//! rather than runtime class assembly.

use crate::parameters::{Parameter, ParameterSource};
use serde::{Deserialize, Serialize};

/// Instrument setup of an experiment, tagged by beam mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InstrumentSetup {
    ConstantWavelength {
        /// Incident neutron or X-ray wavelength
        wavelength: Parameter,
        /// Instrument misalignment offset
        twotheta_offset: Parameter,
    },
    TimeOfFlight {
        /// Detector bank position
        twotheta_bank: Parameter,
        /// TOF offset
        d_to_tof_offset: Parameter,
        /// TOF linear conversion
        d_to_tof_linear: Parameter,
        /// TOF quadratic correction
        d_to_tof_quad: Parameter,
    },
}

impl InstrumentSetup {
    pub fn constant_wavelength() -> Self {
        Self::ConstantWavelength {
            wavelength: Parameter::new("wavelength", 1.5406).with_units("Å"),
            twotheta_offset: Parameter::new("2theta_offset", 0.0).with_units("deg"),
        }
    }

    pub fn time_of_flight() -> Self {
        Self::TimeOfFlight {
            twotheta_bank: Parameter::new("2theta_bank", 144.845).with_units("deg"),
            d_to_tof_offset: Parameter::new("d_to_tof_offset", 0.0).with_units("µs"),
            d_to_tof_linear: Parameter::new("d_to_tof_linear", 7476.91).with_units("µs/Å"),
            d_to_tof_quad: Parameter::new("d_to_tof_quad", -1.54).with_units("µs/Å²"),
        }
    }
}

impl ParameterSource for InstrumentSetup {
    fn cif_category_name(&self) -> String {
        "_instr".to_string()
    }

    fn parameters(&self) -> Vec<&Parameter> {
        match self {
            Self::ConstantWavelength {
                wavelength,
                twotheta_offset,
            } => vec![wavelength, twotheta_offset],
            Self::TimeOfFlight {
                twotheta_bank,
                d_to_tof_offset,
                d_to_tof_linear,
                d_to_tof_quad,
            } => vec![twotheta_bank, d_to_tof_offset, d_to_tof_linear, d_to_tof_quad],
        }
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        match self {
            Self::ConstantWavelength {
                wavelength,
                twotheta_offset,
            } => vec![wavelength, twotheta_offset],
            Self::TimeOfFlight {
                twotheta_bank,
                d_to_tof_offset,
                d_to_tof_linear,
                d_to_tof_quad,
            } => vec![twotheta_bank, d_to_tof_offset, d_to_tof_linear, d_to_tof_quad],
        }
    }
}
