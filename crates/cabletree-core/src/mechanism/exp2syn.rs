//! Double-exponential conductance synapse
//!
//! Difference of two exponentials with rise constant `tau1` and decay
//! constant `tau2 > tau1`, normalised so a unit-weight event peaks at 1 µS.

use super::{check_param_names, param, ParamMap};
use crate::backend::{Index, Value};
use crate::error::{CoreError, Result};
use crate::types::TimeMs;

/// Two-state exponential synapse instances.
#[derive(Debug, Clone)]
pub struct Exp2Syn {
    pub(super) node_index: Vec<Index>,
    /// Rise time constant (ms)
    tau1: Value,
    /// Decay time constant (ms)
    tau2: Value,
    /// Reversal potential (mV)
    e: Value,
    /// Peak normalisation applied to incoming weights
    factor: Value,
    a: Vec<Value>,
    b: Vec<Value>,
}

impl Exp2Syn {
    /// Parameter names this mechanism accepts.
    pub const PARAMS: [&'static str; 3] = ["tau1", "tau2", "e"];

    /// Build instances at the given compartments.
    pub fn new(node_index: Vec<Index>, params: &ParamMap) -> Result<Self> {
        check_param_names("exp2syn", params, &Self::PARAMS)?;
        let tau1 = param("exp2syn", params, "tau1", 0.5, (1e-9, 1e9))?;
        let tau2 = param("exp2syn", params, "tau2", 2.0, (1e-9, 1e9))?;
        let e = param("exp2syn", params, "e", 0.0, (-1e9, 1e9))?;
        if tau1 >= tau2 {
            return Err(CoreError::invalid_parameter(
                "exp2syn.tau1",
                tau1,
                format!("< tau2 = {}", tau2),
            ));
        }

        let t_peak = tau1 * tau2 / (tau2 - tau1) * (tau2 / tau1).ln();
        let factor = 1.0 / ((-t_peak / tau2).exp() - (-t_peak / tau1).exp());

        let n = node_index.len();
        Ok(Self {
            node_index,
            tau1,
            tau2,
            e,
            factor,
            a: vec![0.0; n],
            b: vec![0.0; n],
        })
    }

    /// Clear state.
    pub fn init(&mut self) {
        self.a.iter_mut().for_each(|x| *x = 0.0);
        self.b.iter_mut().for_each(|x| *x = 0.0);
    }

    /// Add the synaptic current into the current vector; the conductance is
    /// `b - a`.
    pub fn current(&mut self, voltage: &[Value], current: &mut [Value]) {
        for (k, &ci) in self.node_index.iter().enumerate() {
            let ci = ci as usize;
            let g = self.b[k] - self.a[k];
            current[ci] += g * (voltage[ci] - self.e);
        }
    }

    /// Analytic decay of both states over `dt`.
    pub fn state(&mut self, dt: TimeMs) {
        let da = (-dt / self.tau1).exp();
        let db = (-dt / self.tau2).exp();
        for k in 0..self.a.len() {
            self.a[k] *= da;
            self.b[k] *= db;
        }
    }

    /// Event delivery kicks both states by the normalised weight.
    pub fn net_receive(&mut self, index: usize, weight: Value) {
        self.a[index] += weight * self.factor;
        self.b[index] += weight * self.factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conductance_peaks_at_weight() {
        let mut syn = Exp2Syn::new(vec![0], &ParamMap::new()).unwrap();
        syn.net_receive(0, 1.0);

        // scan past the analytic peak time in fine steps
        let dt = 1e-3;
        let mut g_max: f64 = 0.0;
        for _ in 0..4000 {
            syn.state(dt);
            g_max = g_max.max(syn.b[0] - syn.a[0]);
        }
        assert!((g_max - 1.0).abs() < 1e-3, "peak {} should be 1", g_max);
    }

    #[test]
    fn conductance_starts_at_zero() {
        let mut syn = Exp2Syn::new(vec![0], &ParamMap::new()).unwrap();
        syn.net_receive(0, 1.0);
        // a == b right after delivery, so g == 0
        assert!((syn.b[0] - syn.a[0]).abs() < 1e-12);
    }

    #[test]
    fn rejects_inverted_time_constants() {
        let mut params = ParamMap::new();
        params.insert("tau1".into(), 3.0);
        params.insert("tau2".into(), 2.0);
        assert!(Exp2Syn::new(vec![0], &params).is_err());
    }
}
