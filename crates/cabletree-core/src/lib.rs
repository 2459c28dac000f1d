//! Multicompartment cable-neuron simulation engine
//!
//! Biophysically detailed neurons (branching dendritic trees with ionic
//! channels and synapses) are advanced over simulated time in batches called
//! cell groups. Threshold crossings at detectors become spikes, spikes are
//! exchanged between ranks at fixed communication epochs sized by half the
//! global minimum conduction delay, and gathered spikes are routed through a
//! sorted connection table into per-group event queues for delivery as
//! weighted synaptic input.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod cell;
pub mod communicator;
pub mod connection;
pub mod error;
pub mod event_queue;
pub mod fvm;
pub mod group;
pub mod matrix;
pub mod mechanism;
pub mod model;
pub mod partition;
pub mod policy;
pub mod recipe;
pub mod types;

pub use backend::{Backend, MulticoreBackend};
pub use cell::{Cell, Location, MechanismDesc};
pub use communicator::Communicator;
pub use connection::Connection;
pub use error::{CoreError, Result};
pub use event_queue::{EventQueue, PostedEvent};
pub use group::CellGroup;
pub use matrix::HinesMatrix;
pub use mechanism::{Mechanism, MechanismRegistry};
pub use model::Model;
pub use partition::DomainDecomposition;
pub use policy::{CommunicationPolicy, GatheredVector, SerialPolicy};
pub use recipe::{
    BasicRecipeParam, CompleteGraphRecipe, ProbeDistribution, RandomGraphRecipe, Recipe,
    RingRecipe,
};
pub use types::{CellGid, CellLocalIndex, CellMember, Spike, TimeMs};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_integration() {
        let member = CellMember::new(0, 0);
        let spike = Spike::new(member, 1.0);
        assert_eq!(spike.source, member);

        let registry = MechanismRegistry::default();
        assert!(registry.contains("hh"));
    }
}
