//! Single-exponential conductance synapse
//!
//! On delivery the conductance jumps by the connection weight and then decays
//! with time constant `tau`; the decay is advanced analytically each step, so
//! repeated delivery of the same event sequence reproduces identical state.

use super::{check_param_names, param, ParamMap};
use crate::backend::{Index, Value};
use crate::error::Result;
use crate::types::TimeMs;

/// Exponential synapse instances, one conductance state per attachment point.
#[derive(Debug, Clone)]
pub struct ExpSyn {
    pub(super) node_index: Vec<Index>,
    /// Decay time constant (ms)
    tau: Value,
    /// Reversal potential (mV)
    e: Value,
    /// Instantaneous conductance (µS)
    g: Vec<Value>,
}

impl ExpSyn {
    /// Parameter names this mechanism accepts.
    pub const PARAMS: [&'static str; 2] = ["tau", "e"];

    /// Build instances at the given compartments.
    pub fn new(node_index: Vec<Index>, params: &ParamMap) -> Result<Self> {
        check_param_names("expsyn", params, &Self::PARAMS)?;
        let tau = param("expsyn", params, "tau", 2.0, (1e-9, 1e9))?;
        let e = param("expsyn", params, "e", 0.0, (-1e9, 1e9))?;
        let n = node_index.len();
        Ok(Self {
            node_index,
            tau,
            e,
            g: vec![0.0; n],
        })
    }

    /// Clear conductances.
    pub fn init(&mut self) {
        self.g.iter_mut().for_each(|g| *g = 0.0);
    }

    /// Add the synaptic current into the current vector.
    pub fn current(&mut self, voltage: &[Value], current: &mut [Value]) {
        for (k, &ci) in self.node_index.iter().enumerate() {
            let ci = ci as usize;
            current[ci] += self.g[k] * (voltage[ci] - self.e);
        }
    }

    /// Analytic decay over `dt`.
    pub fn state(&mut self, dt: TimeMs) {
        let decay = (-dt / self.tau).exp();
        for g in self.g.iter_mut() {
            *g *= decay;
        }
    }

    /// Conductance step on event delivery.
    pub fn net_receive(&mut self, index: usize, weight: Value) {
        self.g[index] += weight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_then_decay() {
        let mut syn = ExpSyn::new(vec![0], &ParamMap::new()).unwrap();
        syn.net_receive(0, 0.5);
        assert_eq!(syn.g[0], 0.5);

        // one tau of decay
        syn.state(2.0);
        assert!((syn.g[0] - 0.5 * (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn replaying_identical_events_reproduces_state() {
        let mut a = ExpSyn::new(vec![0], &ParamMap::new()).unwrap();
        let mut b = ExpSyn::new(vec![0], &ParamMap::new()).unwrap();
        for syn in [&mut a, &mut b] {
            syn.net_receive(0, 0.25);
            syn.state(0.5);
            syn.net_receive(0, 0.25);
            syn.state(1.5);
        }
        assert_eq!(a.g[0].to_bits(), b.g[0].to_bits());
    }

    #[test]
    fn rejects_nonpositive_tau() {
        let mut params = ParamMap::new();
        params.insert("tau".into(), 0.0);
        assert!(ExpSyn::new(vec![0], &params).is_err());
    }
}
