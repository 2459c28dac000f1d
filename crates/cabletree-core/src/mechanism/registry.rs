//! Name-to-constructor registry for mechanisms

use super::{Exp2Syn, ExpSyn, Hh, IClamp, Mechanism, ParamMap, Pas};
use crate::backend::{Index, Value};
use crate::error::{CoreError, Result};
use std::collections::BTreeMap;

/// Where a mechanism instance is placed when it is built.
#[derive(Debug, Clone)]
pub enum MechanismSiting {
    /// Distributed over compartments with their membrane areas (µm²)
    Density {
        /// Compartment of each instance
        node_index: Vec<Index>,
        /// Membrane area of each compartment (µm²)
        node_area: Vec<Value>,
    },
    /// Attached at individual compartments
    Point {
        /// Compartment of each instance
        node_index: Vec<Index>,
    },
}

type Builder = fn(MechanismSiting, &ParamMap) -> Result<Mechanism>;

/// Maps mechanism names to constructors. Unknown names are
/// model-description errors, as is siting a density mechanism as a point
/// process or vice versa.
#[derive(Clone)]
pub struct MechanismRegistry {
    builders: BTreeMap<&'static str, Builder>,
}

impl Default for MechanismRegistry {
    fn default() -> Self {
        let mut builders: BTreeMap<&'static str, Builder> = BTreeMap::new();
        builders.insert("hh", build_hh);
        builders.insert("pas", build_pas);
        builders.insert("expsyn", build_expsyn);
        builders.insert("exp2syn", build_exp2syn);
        builders.insert("iclamp", build_iclamp);
        Self { builders }
    }
}

impl std::fmt::Debug for MechanismRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MechanismRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl MechanismRegistry {
    /// Is `name` registered?
    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Registered mechanism names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builders.keys().copied()
    }

    /// Build a mechanism instance by name.
    pub fn build(
        &self,
        name: &str,
        siting: MechanismSiting,
        params: &ParamMap,
    ) -> Result<Mechanism> {
        let builder = self.builders.get(name).ok_or_else(|| {
            CoreError::model_description(name, "unknown mechanism name")
        })?;
        builder(siting, params)
    }
}

fn density_siting(name: &str, siting: MechanismSiting) -> Result<(Vec<Index>, Vec<Value>)> {
    match siting {
        MechanismSiting::Density {
            node_index,
            node_area,
        } => Ok((node_index, node_area)),
        MechanismSiting::Point { .. } => Err(CoreError::model_description(
            name,
            "density mechanism placed as a point process",
        )),
    }
}

fn point_siting(name: &str, siting: MechanismSiting) -> Result<Vec<Index>> {
    match siting {
        MechanismSiting::Point { node_index } => Ok(node_index),
        MechanismSiting::Density { .. } => Err(CoreError::model_description(
            name,
            "point mechanism distributed as a density",
        )),
    }
}

fn build_hh(siting: MechanismSiting, params: &ParamMap) -> Result<Mechanism> {
    let (node_index, node_area) = density_siting("hh", siting)?;
    Ok(Mechanism::Hh(Hh::new(node_index, &node_area, params)?))
}

fn build_pas(siting: MechanismSiting, params: &ParamMap) -> Result<Mechanism> {
    let (node_index, node_area) = density_siting("pas", siting)?;
    Ok(Mechanism::Pas(Pas::new(node_index, &node_area, params)?))
}

fn build_expsyn(siting: MechanismSiting, params: &ParamMap) -> Result<Mechanism> {
    let node_index = point_siting("expsyn", siting)?;
    Ok(Mechanism::ExpSyn(ExpSyn::new(node_index, params)?))
}

fn build_exp2syn(siting: MechanismSiting, params: &ParamMap) -> Result<Mechanism> {
    let node_index = point_siting("exp2syn", siting)?;
    Ok(Mechanism::Exp2Syn(Exp2Syn::new(node_index, params)?))
}

fn build_iclamp(siting: MechanismSiting, params: &ParamMap) -> Result<Mechanism> {
    let node_index = point_siting("iclamp", siting)?;
    Ok(Mechanism::IClamp(IClamp::new(node_index, params)?))
}
