//! Peak profile components
//!
//! Profile parameters differ between constant-wavelength and time-of-flight
//! experiments; each variant carries its own fixed parameter set.

use crate::parameters::{Parameter, ParameterSource};
use serde::{Deserialize, Serialize};

/// Peak profile of an experiment, tagged by beam mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PeakProfile {
    /// Pseudo-Voigt profile for constant-wavelength data.
    PseudoVoigt {
        broad_gauss_u: Parameter,
        broad_gauss_v: Parameter,
        broad_gauss_w: Parameter,
        broad_lorentz_x: Parameter,
        broad_lorentz_y: Parameter,
    },
    /// Back-to-back exponential convolved pseudo-Voigt for time-of-flight data.
    TofPseudoVoigt {
        gauss_sigma_0: Parameter,
        gauss_sigma_1: Parameter,
        gauss_sigma_2: Parameter,
        mix_beta_0: Parameter,
        mix_beta_1: Parameter,
    },
}

impl PeakProfile {
    pub fn pseudo_voigt() -> Self {
        Self::PseudoVoigt {
            broad_gauss_u: Parameter::new("broad_gauss_u", 0.0333).with_units("deg²"),
            broad_gauss_v: Parameter::new("broad_gauss_v", -0.01).with_units("deg²"),
            broad_gauss_w: Parameter::new("broad_gauss_w", 0.02).with_units("deg²"),
            broad_lorentz_x: Parameter::new("broad_lorentz_x", 0.0).with_units("deg"),
            broad_lorentz_y: Parameter::new("broad_lorentz_y", 0.0).with_units("deg"),
        }
    }

    pub fn tof_pseudo_voigt() -> Self {
        Self::TofPseudoVoigt {
            gauss_sigma_0: Parameter::new("gauss_sigma_0", 0.0).with_units("µs²"),
            gauss_sigma_1: Parameter::new("gauss_sigma_1", 0.0).with_units("µs/Å"),
            gauss_sigma_2: Parameter::new("gauss_sigma_2", 0.0).with_units("µs²/Å²"),
            mix_beta_0: Parameter::new("mix_beta_0", 0.0),
            mix_beta_1: Parameter::new("mix_beta_1", 0.0),
        }
    }
}

impl ParameterSource for PeakProfile {
    fn cif_category_name(&self) -> String {
        "_peak".to_string()
    }

    fn parameters(&self) -> Vec<&Parameter> {
        match self {
            Self::PseudoVoigt {
                broad_gauss_u,
                broad_gauss_v,
                broad_gauss_w,
                broad_lorentz_x,
                broad_lorentz_y,
            } => vec![
                broad_gauss_u,
                broad_gauss_v,
                broad_gauss_w,
                broad_lorentz_x,
                broad_lorentz_y,
            ],
            Self::TofPseudoVoigt {
                gauss_sigma_0,
                gauss_sigma_1,
                gauss_sigma_2,
                mix_beta_0,
                mix_beta_1,
            } => vec![
                gauss_sigma_0,
                gauss_sigma_1,
                gauss_sigma_2,
                mix_beta_0,
                mix_beta_1,
            ],
        }
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        match self {
            Self::PseudoVoigt {
                broad_gauss_u,
                broad_gauss_v,
                broad_gauss_w,
                broad_lorentz_x,
                broad_lorentz_y,
            } => vec![
                broad_gauss_u,
                broad_gauss_v,
                broad_gauss_w,
                broad_lorentz_x,
                broad_lorentz_y,
            ],
            Self::TofPseudoVoigt {
                gauss_sigma_0,
                gauss_sigma_1,
                gauss_sigma_2,
                mix_beta_0,
                mix_beta_1,
            } => vec![
                gauss_sigma_0,
                gauss_sigma_1,
                gauss_sigma_2,
                mix_beta_0,
                mix_beta_1,
            ],
        }
    }
}
