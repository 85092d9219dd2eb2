//! Atom site components

use crate::parameters::{Descriptor, Parameter, ParameterSource};
use serde::{Deserialize, Serialize};

/// A single atom site within a sample model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomSite {
    pub label: Descriptor<String>,
    pub type_symbol: Descriptor<String>,
    pub fract_x: Parameter,
    pub fract_y: Parameter,
    pub fract_z: Parameter,
    pub occupancy: Parameter,
    pub b_iso: Parameter,
}

impl AtomSite {
    pub fn new(label: &str, type_symbol: &str) -> Self {
        Self {
            label: Descriptor::new("label", label.to_string()),
            type_symbol: Descriptor::new("type_symbol", type_symbol.to_string()),
            fract_x: Parameter::new("fract_x", 0.0),
            fract_y: Parameter::new("fract_y", 0.0),
            fract_z: Parameter::new("fract_z", 0.0),
            occupancy: Parameter::new("occupancy", 1.0),
            b_iso: Parameter::new("B_iso_or_equiv", 0.0).with_units("Å²"),
        }
    }

    /// Set fractional coordinates, builder style.
    pub fn with_fract(mut self, x: f64, y: f64, z: f64) -> Self {
        self.fract_x.assign(x);
        self.fract_y.assign(y);
        self.fract_z.assign(z);
        self
    }

    /// Set the isotropic displacement parameter, builder style.
    pub fn with_b_iso(mut self, b_iso: f64) -> Self {
        self.b_iso.assign(b_iso);
        self
    }
}

impl ParameterSource for AtomSite {
    fn cif_category_name(&self) -> String {
        format!("_atom_site['{}']", self.label.value())
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![
            &self.fract_x,
            &self.fract_y,
            &self.fract_z,
            &self.occupancy,
            &self.b_iso,
        ]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![
            &mut self.fract_x,
            &mut self.fract_y,
            &mut self.fract_z,
            &mut self.occupancy,
            &mut self.b_iso,
        ]
    }
}

/// Insertion-ordered collection of atom sites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AtomSites {
    sites: Vec<AtomSite>,
}

impl AtomSites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, site: AtomSite) {
        self.sites.push(site);
    }

    pub fn get(&self, label: &str) -> Option<&AtomSite> {
        self.sites.iter().find(|s| s.label.value() == label)
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut AtomSite> {
        self.sites.iter_mut().find(|s| s.label.value() == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AtomSite> {
        self.sites.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AtomSite> {
        self.sites.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
