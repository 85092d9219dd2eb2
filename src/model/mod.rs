//! Sample model domain objects
//!
//! A [`SampleModel`] wraps the crystallographic description of one phase:
//! space group, unit cell, and atom sites. The engine treats these purely as
//! sources of refinable parameters; structure-factor math lives in external
//! calculators.

pub mod atom_site;
pub mod cell;
pub mod space_group;

pub use atom_site::{AtomSite, AtomSites};
pub use cell::Cell;
pub use space_group::SpaceGroup;

use crate::parameters::{Parameter, ParameterSource};
use serde::{Deserialize, Serialize};

/// A structural model of one sample phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleModel {
    pub id: String,
    pub space_group: SpaceGroup,
    pub cell: Cell,
    pub atom_sites: AtomSites,
}

impl SampleModel {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            space_group: SpaceGroup::new(),
            cell: Cell::new(),
            atom_sites: AtomSites::new(),
        }
    }

    /// Owned components in fixed declaration order: space group, cell, then
    /// atom sites in insertion order. Collection order depends on this.
    pub fn components(&self) -> Vec<&dyn ParameterSource> {
        let mut comps: Vec<&dyn ParameterSource> = vec![&self.space_group, &self.cell];
        for site in self.atom_sites.iter() {
            comps.push(site);
        }
        comps
    }

    pub fn components_mut(&mut self) -> Vec<&mut dyn ParameterSource> {
        let mut comps: Vec<&mut dyn ParameterSource> =
            vec![&mut self.space_group, &mut self.cell];
        for site in self.atom_sites.iter_mut() {
            comps.push(site);
        }
        comps
    }
}

/// Insertion-ordered collection of sample models.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleModels {
    models: Vec<SampleModel>,
}

impl SampleModels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, model: SampleModel) {
        self.models.push(model);
    }

    pub fn get(&self, id: &str) -> Option<&SampleModel> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SampleModel> {
        self.models.iter_mut().find(|m| m.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleModel> {
        self.models.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SampleModel> {
        self.models.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// All free parameters across all models, in deterministic order.
    pub fn free_parameters(&self) -> Vec<&Parameter> {
        self.models
            .iter()
            .flat_map(|m| m.components())
            .flat_map(|c| c.parameters())
            .filter(|p| p.free())
            .collect()
    }
}
